//! SETTINGS probes.

use h2interop_frame::{
    ErrorCode, Frame, MIN_MAX_FRAME_SIZE, SETTING_ENTRY_LEN, SettingId, SettingsFrame,
    SettingsParameter, UnknownFrame, frame_type,
};
use tracing::{debug, warn};

use super::Context;
use crate::InteropCtx;
use crate::harness::Conn;
use crate::testcase::TestResult;

scenario!(
    "framing",
    small_max_frame_size,
    "SETTINGS_MAX_FRAME_SIZE below 16384 is answered with GOAWAY"
);

scenario!(
    "framing",
    settings_with_stream_id,
    "a SETTINGS frame on a non-zero stream makes the server close the connection"
);

scenario!(
    "framing",
    short_settings_payload,
    "a SETTINGS payload that is not a multiple of 6 is answered with GOAWAY"
);

scenario!(
    "framing",
    all_settings_acked,
    "the server sends its own SETTINGS and acknowledges ours"
);

pub async fn small_max_frame_size(ctx: &InteropCtx) -> TestResult {
    async {
        let mut conn = Conn::connect(ctx).await.context("connect")?;
        let settings = SettingsFrame::new(vec![SettingsParameter::new(
            SettingId::MAX_FRAME_SIZE,
            MIN_MAX_FRAME_SIZE - 1,
        )]);
        conn.handshake(&settings).await.context("handshake")?;

        let goaway = conn
            .expect_goaway_soon(ctx.timeout)
            .await
            .context("waiting for GOAWAY")?;
        debug!(frame = %Frame::from(goaway), "got GOAWAY");
        conn.close().await;
        Ok::<_, String>(())
    }
    .await
    .into()
}

pub async fn settings_with_stream_id(ctx: &InteropCtx) -> TestResult {
    async {
        let mut conn = Conn::connect(ctx).await.context("connect")?;
        let mut settings = SettingsFrame::new(Vec::new());
        settings.header.stream_id = 2;
        conn.handshake(&settings).await.context("handshake")?;

        conn.expect_eof(ctx.timeout)
            .await
            .context("waiting for the server to close")?;
        Ok::<_, String>(())
    }
    .await
    .into()
}

pub async fn short_settings_payload(ctx: &InteropCtx) -> TestResult {
    for length in 1..SETTING_ENTRY_LEN {
        if let Err(e) = truncated_settings(ctx, length).await {
            return TestResult::fail(format!("{length}-byte SETTINGS payload: {e}"));
        }
    }
    TestResult::pass()
}

async fn truncated_settings(ctx: &InteropCtx, length: usize) -> Result<(), String> {
    let mut conn = Conn::connect(ctx).await.context("connect")?;
    conn.handshake(&SettingsFrame::new(Vec::new()))
        .await
        .context("handshake")?;

    // SettingsFrame only marshals whole entries
    let malformed = UnknownFrame::new(frame_type::SETTINGS, vec![0; length]);
    conn.send_frame(&malformed)
        .await
        .context("send SETTINGS")?;

    let goaway = conn
        .expect_goaway_soon(ctx.timeout)
        .await
        .context("waiting for GOAWAY")?;
    if goaway.error() != Some(ErrorCode::FrameSizeError) {
        warn!(
            length,
            error_code = goaway.error_code,
            "GOAWAY without FRAME_SIZE_ERROR"
        );
    }
    conn.close().await;
    Ok(())
}

pub async fn all_settings_acked(ctx: &InteropCtx) -> TestResult {
    async {
        let mut conn = Conn::connect(ctx).await.context("connect")?;
        conn.handshake(&SettingsFrame::new(Vec::new()))
            .await
            .context("handshake")?;

        let mut server_settings = false;
        let mut acked = false;
        let outcome = conn
            .read_until(ctx.timeout, |frame| {
                match frame {
                    Frame::Settings(s) if s.is_ack() => acked = true,
                    Frame::Settings(_) => server_settings = true,
                    _ => {}
                }
                (server_settings && acked).then_some(())
            })
            .await;
        outcome.map_err(|e| {
            format!(
                "waiting for SETTINGS (server settings seen: {server_settings}, ack seen: {acked}): {e}"
            )
        })?;

        conn.close().await;
        Ok::<_, String>(())
    }
    .await
    .into()
}
