//! Frame-type probes.

use h2interop_frame::{Frame, PingFrame, SettingsFrame, UnknownFrame};
use tracing::debug;

use super::Context;
use crate::InteropCtx;
use crate::harness::Conn;
use crate::testcase::TestResult;

/// First type byte with no frame defined by RFC 9113.
const FIRST_UNDEFINED_TYPE: u8 = 0x0a;

scenario!(
    "framing",
    unknown_frame_type,
    "frames of undefined types are ignored and a later PING is still acknowledged"
);

scenario!(
    "framing",
    ping_ack,
    "a PING is acknowledged with the same opaque data"
);

pub async fn unknown_frame_type(ctx: &InteropCtx) -> TestResult {
    async {
        let mut conn = Conn::connect(ctx).await.context("connect")?;
        conn.handshake(&SettingsFrame::new(Vec::new()))
            .await
            .context("handshake")?;

        for ty in FIRST_UNDEFINED_TYPE..=u8::MAX {
            conn.send_frame(&UnknownFrame::new(ty, Vec::new()))
                .await
                .context(&format!("send frame of type {ty:#04x}"))?;
        }
        debug!("sent every undefined frame type");

        ping_round_trip(&mut conn, PingFrame::new(*b"01234567"), ctx).await?;
        conn.close().await;
        Ok::<_, String>(())
    }
    .await
    .into()
}

pub async fn ping_ack(ctx: &InteropCtx) -> TestResult {
    async {
        let mut conn = Conn::connect(ctx).await.context("connect")?;
        conn.handshake(&SettingsFrame::new(Vec::new()))
            .await
            .context("handshake")?;

        ping_round_trip(&mut conn, PingFrame::new(*b"h2interp"), ctx).await?;
        conn.close().await;
        Ok::<_, String>(())
    }
    .await
    .into()
}

/// Send `ping` and wait for its ACK. Pings the server initiates are ignored.
async fn ping_round_trip(conn: &mut Conn, ping: PingFrame, ctx: &InteropCtx) -> Result<(), String> {
    conn.send_frame(&ping).await.context("send PING")?;

    conn.read_until(ctx.timeout, |frame| match frame {
        Frame::Ping(ack) if ack.is_ack() && ack.data == ping.data => Some(Ok(())),
        Frame::Ping(ack) if ack.is_ack() => Some(Err(format!(
            "PING ACK carries {:?}, sent {:?}",
            String::from_utf8_lossy(&ack.data),
            String::from_utf8_lossy(&ping.data)
        ))),
        Frame::GoAway(_) | Frame::Http1(_) => Some(Err(format!("server sent {frame}"))),
        _ => None,
    })
    .await
    .context("waiting for PING ACK")?
}
