//! Scenario registry and runner.
//!
//! Every scenario registers itself with the `scenario!` macro and is collected
//! through inventory. Names are `<suite>.<case>`.

/// Register `async fn $case(&InteropCtx) -> TestResult` as `<suite>.<case>`.
macro_rules! scenario {
    ($suite:literal, $case:ident, $description:literal) => {
        const _: () = {
            fn boxed(
                ctx: &$crate::InteropCtx,
            ) -> ::std::pin::Pin<
                Box<dyn ::std::future::Future<Output = $crate::testcase::TestResult> + Send + '_>,
            > {
                Box::pin($case(ctx))
            }

            inventory::submit! {
                $crate::InteropTest {
                    name: concat!($suite, ".", stringify!($case)),
                    suite: $suite,
                    description: $description,
                    func: boxed,
                }
            }
        };
    };
}

pub mod framing;
pub mod preface;
pub mod settings;
pub mod tls;

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{Instrument, info, info_span, warn};

use crate::harness::Error;
use crate::report::Report;
use crate::testcase::TestResult;
use crate::{InteropCtx, InteropTest};

/// Attach what a scenario was doing to a driver error.
pub(crate) trait Context<T> {
    fn context(self, what: &str) -> Result<T, String>;
}

impl<T> Context<T> for Result<T, Error> {
    fn context(self, what: &str) -> Result<T, String> {
        self.map_err(|e| format!("{what}: {e}"))
    }
}

/// Run a scenario by name (e.g. `framing.ping_ack`).
pub async fn run(name: &str, ctx: &InteropCtx) -> TestResult {
    match find(name) {
        Some(test) => (test.func)(ctx).await,
        None => TestResult::fail(format!("unknown scenario: {name}")),
    }
}

pub fn find(name: &str) -> Option<&'static InteropTest> {
    inventory::iter::<InteropTest>
        .into_iter()
        .find(|test| test.name == name)
}

/// All registered scenarios, sorted by name.
pub fn list_all() -> Vec<&'static InteropTest> {
    let mut tests: Vec<_> = inventory::iter::<InteropTest>.into_iter().collect();
    tests.sort_by_key(|test| test.name);
    tests
}

/// Scenarios of one suite (e.g. `framing`).
pub fn list_suite(suite: &str) -> Vec<&'static InteropTest> {
    list_all()
        .into_iter()
        .filter(|test| test.suite == suite)
        .collect()
}

/// Whether `--test-case filter` selects `test`. No filter, or `all`, selects everything.
pub fn selects(test: &InteropTest, filter: Option<&str>) -> bool {
    match filter {
        None | Some("all") => true,
        Some(filter) => test.suite == filter || test.name == filter,
    }
}

/// Run every selected scenario, at most `jobs` at a time, recording into `report`.
///
/// Scenarios the filter does not select are recorded as skipped.
pub async fn run_all(ctx: Arc<InteropCtx>, report: Arc<Report>, filter: Option<&str>, jobs: usize) {
    let permits = Arc::new(Semaphore::new(jobs.max(1)));
    let mut set = JoinSet::new();

    for test in list_all() {
        if !selects(test, filter) {
            report.record_result(test.name, &TestResult::skip("not selected"));
            continue;
        }

        let ctx = Arc::clone(&ctx);
        let report = Arc::clone(&report);
        let permits = Arc::clone(&permits);
        set.spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };
            let result = run_isolated(test, ctx)
                .instrument(info_span!("scenario", name = test.name))
                .await;
            match (&result.error, result.passed, result.skipped) {
                (_, true, _) => info!(name = test.name, "passed"),
                (reason, _, true) => info!(name = test.name, reason = ?reason, "skipped"),
                (reason, _, false) => warn!(name = test.name, reason = ?reason, "failed"),
            }
            report.record_result(test.name, &result);
        });
    }

    while let Some(joined) = set.join_next().await {
        if let Err(e) = joined {
            warn!(error = %e, "scenario task did not complete");
        }
    }
}

/// Run `test` on its own task so a panic fails that scenario alone.
async fn run_isolated(test: &'static InteropTest, ctx: Arc<InteropCtx>) -> TestResult {
    let handle = tokio::spawn(async move { (test.func)(&ctx).await }.in_current_span());
    match handle.await {
        Ok(result) => result,
        Err(e) if e.is_panic() => TestResult::fail("scenario panicked"),
        Err(e) => TestResult::fail(format!("scenario task failed: {e}")),
    }
}
