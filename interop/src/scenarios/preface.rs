//! Client preface probes.

use h2interop_frame::PREFACE;
use tracing::debug;

use super::Context;
use crate::InteropCtx;
use crate::harness::Conn;
use crate::testcase::TestResult;

scenario!(
    "framing",
    short_preface,
    "every truncated preface followed by a wrong byte makes the server close the connection"
);

pub async fn short_preface(ctx: &InteropCtx) -> TestResult {
    for prefix in 0..PREFACE.len() - 1 {
        if let Err(e) = corrupted_preface(ctx, prefix).await {
            return TestResult::fail(format!("preface cut at {prefix} bytes: {e}"));
        }
    }
    TestResult::pass()
}

async fn corrupted_preface(ctx: &InteropCtx, prefix: usize) -> Result<(), String> {
    let mut conn = Conn::connect(ctx).await.context("connect")?;

    let mut bytes = PREFACE[..prefix].to_vec();
    bytes.push(b'X');
    match conn.send_raw(&bytes).await {
        Err(e) if e.is_closure() => return Ok(()),
        other => other.context("send corrupted preface")?,
    }

    let drained = conn
        .drain_until_eof(ctx.timeout)
        .await
        .context("waiting for the server to close")?;
    debug!(prefix, drained, "server closed");
    Ok(())
}
