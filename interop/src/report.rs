//! Result collection and rendering.

use std::fmt::Write as _;

use owo_colors::OwoColorize;
use parking_lot::Mutex;
use serde::Serialize;

use crate::testcase::TestResult;

/// Outcome of one scenario as it appears in the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaseInfo {
    pub name: String,
    pub passed: bool,
    pub skipped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Append-only list of outcomes, shared by every scenario task.
#[derive(Debug, Default)]
pub struct Report {
    cases: Mutex<Vec<CaseInfo>>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, name: impl Into<String>, passed: bool, skipped: bool) {
        self.push(CaseInfo {
            name: name.into(),
            passed,
            skipped,
            error: None,
        });
    }

    /// Record `result`, keeping its failure or skip reason.
    pub fn record_result(&self, name: impl Into<String>, result: &TestResult) {
        self.push(CaseInfo {
            name: name.into(),
            passed: result.passed,
            skipped: result.skipped,
            error: result.error.clone(),
        });
    }

    fn push(&self, case: CaseInfo) {
        self.cases.lock().push(case);
    }

    /// A copy of every recorded case, sorted by name.
    pub fn snapshot(&self) -> Vec<CaseInfo> {
        let mut cases = self.cases.lock().clone();
        cases.sort_by(|a, b| a.name.cmp(&b.name));
        cases
    }

    pub fn summary(&self) -> Summary {
        self.cases
            .lock()
            .iter()
            .fold(Summary::default(), |mut summary, case| {
                if case.skipped {
                    summary.skipped += 1;
                } else if case.passed {
                    summary.passed += 1;
                } else {
                    summary.failed += 1;
                }
                summary
            })
    }

    /// 0 when nothing that ran failed, 1 otherwise.
    pub fn exit_code(&self) -> u8 {
        if self.summary().failed == 0 { 0 } else { 1 }
    }

    pub fn render_text(&self, color: bool) -> String {
        let mut out = String::new();
        for case in self.snapshot() {
            let tag = match (case.skipped, case.passed) {
                (true, _) => paint("SKIP", color, |s| s.yellow().to_string()),
                (false, true) => paint("PASS", color, |s| s.green().to_string()),
                (false, false) => paint("FAIL", color, |s| s.red().bold().to_string()),
            };
            let _ = write!(out, "{tag} {}", case.name);
            if let Some(error) = &case.error {
                let _ = write!(out, ": {error}");
            }
            out.push('\n');
        }

        let Summary {
            passed,
            failed,
            skipped,
        } = self.summary();
        let _ = writeln!(
            out,
            "\n{passed} passed, {failed} failed, {skipped} skipped"
        );
        out
    }

    pub fn render_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.snapshot())
    }
}

fn paint(tag: &str, color: bool, style: impl Fn(&str) -> String) -> String {
    if color { style(tag) } else { tag.to_string() }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn skipped_cases_do_not_fail_the_run() {
        let report = Report::new();
        report.record("framing.ping_ack", true, false);
        report.record("tls.alpn_h2c", false, true);
        assert_eq!(
            report.summary(),
            Summary {
                passed: 1,
                failed: 0,
                skipped: 1
            }
        );
        assert_eq!(report.exit_code(), 0);

        report.record_result("framing.short_preface", &TestResult::fail("prefix 3: no EOF"));
        assert_eq!(report.exit_code(), 1);
    }

    #[test]
    fn snapshot_is_sorted_copy() {
        let report = Report::new();
        report.record("b", true, false);
        report.record("a", true, false);
        let snapshot = report.snapshot();
        report.record("c", true, false);

        let names: Vec<_> = snapshot.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["a", "b"]);
        assert_eq!(report.snapshot().len(), 3);
    }

    #[test]
    fn concurrent_records_all_land() {
        let report = Arc::new(Report::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let report = Arc::clone(&report);
                std::thread::spawn(move || {
                    for i in 0..100 {
                        report.record(format!("case-{t}-{i}"), i % 2 == 0, false);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        let summary = report.summary();
        assert_eq!(summary.passed + summary.failed, 800);
        assert_eq!(summary.failed, 400);
    }

    #[test]
    fn text_rendering_names_failures() {
        let report = Report::new();
        report.record_result("framing.small_max_frame_size", &TestResult::fail("no GOAWAY"));
        report.record_result("tls.max_version", &TestResult::skip("TLS disabled"));

        let text = report.render_text(false);
        assert!(text.contains("FAIL framing.small_max_frame_size: no GOAWAY"));
        assert!(text.contains("SKIP tls.max_version: TLS disabled"));
        assert!(text.ends_with("0 passed, 1 failed, 1 skipped\n"));
    }

    #[test]
    fn json_rendering_omits_missing_errors() {
        let report = Report::new();
        report.record("framing.ping_ack", true, false);
        let json: serde_json::Value = serde_json::from_str(&report.render_json().unwrap()).unwrap();
        assert_eq!(
            json,
            serde_json::json!([{ "name": "framing.ping_ack", "passed": true, "skipped": false }])
        );
    }
}
