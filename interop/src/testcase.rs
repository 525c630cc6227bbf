//! Scenario outcome.

/// Result of running one scenario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestResult {
    /// Whether the scenario passed.
    pub passed: bool,
    /// The scenario did not run against the target.
    pub skipped: bool,
    /// Failure or skip reason.
    pub error: Option<String>,
}

impl TestResult {
    /// Create a passing result.
    pub fn pass() -> Self {
        Self {
            passed: true,
            skipped: false,
            error: None,
        }
    }

    /// Create a failing result with an error message.
    pub fn fail(msg: impl Into<String>) -> Self {
        Self {
            passed: false,
            skipped: false,
            error: Some(msg.into()),
        }
    }

    pub fn skip(reason: impl Into<String>) -> Self {
        Self {
            passed: false,
            skipped: true,
            error: Some(reason.into()),
        }
    }
}

impl<E: std::fmt::Display> From<Result<(), E>> for TestResult {
    fn from(result: Result<(), E>) -> Self {
        match result {
            Ok(()) => Self::pass(),
            Err(e) => Self::fail(e.to_string()),
        }
    }
}
