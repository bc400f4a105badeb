use camino::{Utf8Path, Utf8PathBuf};
use h2harness_core::error::{HarnessError, Result};
use h2harness_core::failure::{ExclusionSet, FailureRecord, spec_identifier};
use tracing::{debug, warn};

use crate::xml::{XmlDocument, XmlElement};

/// Parses every `*.xml` report in `dir`, in the directory's natural listing
/// order, into failure records. Files that fail to load or parse are logged
/// and skipped.
pub fn parse_report_dir(dir: &Utf8Path, exclusions: &ExclusionSet) -> Result<Vec<FailureRecord>> {
    let mut files = Vec::new();
    for entry in dir.read_dir_utf8()? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_file() && path.extension() == Some("xml") {
            files.push(path.to_path_buf());
        }
    }
    debug!("Parsing {} report file(s) in {}", files.len(), dir);
    Ok(parse_report_files(files, exclusions))
}

/// Parses the given report files in order. A suite with a blank group name
/// inherits the most recent non-blank one, including across file boundaries,
/// so the file order decides which group such suites land in.
pub fn parse_report_files<I>(files: I, exclusions: &ExclusionSet) -> Vec<FailureRecord>
where
    I: IntoIterator<Item = Utf8PathBuf>,
{
    let mut failures = Vec::new();
    let mut current_group = String::new();
    for path in files {
        match parse_report_file(&path, &current_group, exclusions) {
            Ok((records, group)) => {
                failures.extend(records);
                current_group = group;
            }
            Err(e) => warn!("Skipping report {}: {}", path, e),
        }
    }
    failures
}

fn load_document(path: &Utf8Path) -> Result<XmlDocument> {
    let content = std::fs::read_to_string(path)?;
    XmlDocument::parse(&content).map_err(HarnessError::ReportParse)
}

/// Parses one file into records. Returns the group in effect afterwards, so
/// a failed file contributes neither records nor a group change.
fn parse_report_file(
    path: &Utf8Path,
    inherited_group: &str,
    exclusions: &ExclusionSet,
) -> Result<(Vec<FailureRecord>, String)> {
    let document = load_document(path)?;
    let mut group = inherited_group.to_string();
    let mut records = Vec::new();

    for suite in suite_elements(&document.root) {
        if let Some(name) = suite.attr("package") {
            if !name.is_empty() {
                group = name.to_string();
            }
        }

        if error_count(suite)? == 0 {
            continue;
        }

        for case in suite.elements("testcase") {
            let Some((expected, actual)) = split_failure_detail(case) else {
                continue;
            };
            let case_name = case.attr("classname").unwrap_or_default();
            let identifier = spec_identifier(&group, case_name);
            records.push(FailureRecord::new(
                case_name,
                group.clone(),
                actual,
                expected,
                exclusions.contains(&identifier),
            ));
        }
    }
    Ok((records, group))
}

/// The root may be a `<testsuites>` list or a single bare `<testsuite>`.
fn suite_elements(root: &XmlElement) -> Vec<&XmlElement> {
    if root.name == "testsuite" {
        vec![root]
    } else {
        root.elements("testsuite").collect()
    }
}

fn error_count(suite: &XmlElement) -> Result<u32> {
    match suite.attr("errors") {
        Some(value) => value.parse().map_err(|_| {
            HarnessError::ReportParse(format!(
                "Invalid errors count {:?} on suite {:?}",
                value,
                suite.attr("name").unwrap_or_default()
            ))
        }),
        None => Ok(0),
    }
}

/// Failure detail is two lines of text: what was expected, then what the
/// server actually did. The split is positional on the raw text, so a
/// detail starting with a newline has an empty expected line. A case
/// without a failure element has no detail and contributes no record.
fn split_failure_detail(case: &XmlElement) -> Option<(String, String)> {
    let detail = case
        .first_element("failure")
        .or_else(|| case.first_element("error"))?
        .text();
    let mut lines = detail.split('\n');
    let expected = lines.next().unwrap_or_default().to_string();
    let actual = lines.next().unwrap_or_default().to_string();
    Some((expected, actual))
}
