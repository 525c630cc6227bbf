//! TLS negotiation probes. Both are skipped when the target speaks plaintext.

use tokio::time::Instant;
use tracing::debug;

use super::Context;
use crate::InteropCtx;
use crate::harness::{Conn, Error};
use crate::testcase::TestResult;
use crate::tls::{
    self, ALPN_H2C, LEGACY_TLS11, LegacyReply, TlsOptions, classify_legacy_reply,
    legacy_client_hello,
};

scenario!(
    "tls",
    max_version,
    "a ClientHello capped at TLS 1.1 is refused"
);

scenario!(
    "tls",
    alpn_h2c,
    "offering only the h2c ALPN token gets the connection refused"
);

const TLS_REQUIRED: &str = "target is plaintext (--use-tls=false)";

pub async fn max_version(ctx: &InteropCtx) -> TestResult {
    if !ctx.use_tls {
        return TestResult::skip(TLS_REQUIRED);
    }
    legacy_hello_refused(ctx).await.into()
}

async fn legacy_hello_refused(ctx: &InteropCtx) -> Result<(), String> {
    let tcp = Conn::dial(ctx).await.context("dial")?;
    let mut conn = Conn::from_io(tcp);

    match conn
        .send_raw(&legacy_client_hello(ctx.server_name(), LEGACY_TLS11))
        .await
    {
        Err(e) if e.is_closure() => return Ok(()),
        other => other.context("send ClientHello")?,
    }

    let deadline = Instant::now() + ctx.timeout;
    let mut reply = Vec::new();
    let mut buf = [0u8; 512];
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match conn.read_raw(&mut buf, remaining).await {
            Ok(0) => break,
            Ok(n) => {
                reply.extend_from_slice(&buf[..n]);
                if classify_legacy_reply(&reply) != LegacyReply::Other {
                    break;
                }
            }
            Err(e) if e.is_closure() => break,
            Err(e) => return Err(format!("waiting for the server's answer: {e}")),
        }
    }
    conn.close().await;

    match classify_legacy_reply(&reply) {
        LegacyReply::Alert { level, description } => {
            debug!(level, description, "refused with alert");
            Ok(())
        }
        LegacyReply::ServerHello { version } => {
            Err(format!("server accepted the handshake (ServerHello {version:#06x})"))
        }
        LegacyReply::Other if reply.is_empty() => Ok(()),
        LegacyReply::Other => Err(format!(
            "unexpected {}-byte answer to a TLS 1.1 ClientHello",
            reply.len()
        )),
    }
}

pub async fn alpn_h2c(ctx: &InteropCtx) -> TestResult {
    if !ctx.use_tls {
        return TestResult::skip(TLS_REQUIRED);
    }
    h2c_refused(ctx).await.into()
}

async fn h2c_refused(ctx: &InteropCtx) -> Result<(), String> {
    let options = TlsOptions::default().with_alpn(&[ALPN_H2C]);
    let mut conn = match Conn::connect_with(ctx, &options).await {
        Ok(conn) => conn,
        Err(Error::Handshake { source, .. }) if tls::is_peer_rejection(&source) => {
            debug!(error = %source, "handshake refused");
            return Ok(());
        }
        Err(e) => return Err(format!("connect: {e}")),
    };

    if let Some(selected) = conn.alpn_protocol() {
        return Err(format!(
            "server selected ALPN {:?}",
            String::from_utf8_lossy(selected)
        ));
    }

    let mut buf = [0u8; 64];
    let outcome = match conn.read_raw(&mut buf, ctx.timeout).await {
        Ok(0) => Ok(()),
        Ok(n) => Err(format!("read {n} bytes, expected the server to close")),
        Err(e) if e.is_closure() => Ok(()),
        Err(Error::Io(e)) if tls::is_peer_rejection(&e) => Ok(()),
        Err(e) => Err(format!("waiting for the server to close: {e}")),
    };
    conn.close().await;
    outcome
}
