use std::collections::HashSet;
use std::fmt;

/// Identifier a conformance case is known by in exclusion lists:
/// the report group name and the case classname joined by " - ".
pub fn spec_identifier(group_name: &str, case_name: &str) -> String {
    format!("{} - {}", group_name, case_name)
}

/// One failed conformance case lifted out of a report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRecord {
    pub case_name: String,
    pub group_name: String,
    pub actual: String,
    pub expected: String,
    pub ignored: bool,
}

impl FailureRecord {
    pub fn new(
        case_name: impl Into<String>,
        group_name: impl Into<String>,
        actual: impl Into<String>,
        expected: impl Into<String>,
        ignored: bool,
    ) -> Self {
        Self {
            case_name: case_name.into(),
            group_name: group_name.into(),
            actual: actual.into(),
            expected: expected.into(),
            ignored,
        }
    }

    pub fn spec_identifier(&self) -> String {
        spec_identifier(&self.group_name, &self.case_name)
    }
}

impl fmt::Display for FailureRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] failed\nExpected: {}\nActual: {}",
            self.spec_identifier(),
            self.expected,
            self.actual
        )
    }
}

/// Exact-match set of spec identifiers whose failures are expected.
#[derive(Debug, Clone, Default)]
pub struct ExclusionSet {
    entries: HashSet<String>,
}

impl ExclusionSet {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entries: entries.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, spec_identifier: &str) -> bool {
        self.entries.contains(spec_identifier)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<String> for ExclusionSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self::new(iter)
    }
}
