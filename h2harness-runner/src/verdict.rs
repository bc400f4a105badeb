use h2harness_core::failure::FailureRecord;
use tracing::{error, info, warn};

/// Splits failure records into `(non_ignored, ignored)`, keeping their
/// relative order.
pub fn partition(records: Vec<FailureRecord>) -> (Vec<FailureRecord>, Vec<FailureRecord>) {
    records.into_iter().partition(|record| !record.ignored)
}

/// Outcome of a conformance run.
#[derive(Debug, Clone)]
pub struct Verdict {
    pub non_ignored: Vec<FailureRecord>,
    pub ignored: Vec<FailureRecord>,
}

impl Verdict {
    pub fn from_records(records: Vec<FailureRecord>) -> Self {
        let (non_ignored, ignored) = partition(records);
        Self {
            non_ignored,
            ignored,
        }
    }

    pub fn passed(&self) -> bool {
        self.non_ignored.is_empty()
    }

    /// Multi-block failure summary, one block per non-ignored failure.
    pub fn summary(&self) -> String {
        let blocks: Vec<String> = self.non_ignored.iter().map(ToString::to_string).collect();
        format!("Failed test cases:\n\n{}", blocks.join("\n\n"))
    }

    /// Logs the outcome and returns whether the run counts as passing,
    /// which it always does when `ignore_failures` is set.
    pub fn evaluate(&self, ignore_failures: bool) -> bool {
        if self.passed() {
            info!(
                "All test cases passed ({} ignored failure(s))",
                self.ignored.len()
            );
            return true;
        }
        if ignore_failures {
            warn!("{}", self.summary());
            warn!(
                "Ignoring {} failed test case(s) as configured",
                self.non_ignored.len()
            );
            true
        } else {
            error!("{}", self.summary());
            false
        }
    }
}
