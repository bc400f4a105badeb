use camino::Utf8PathBuf;
use h2harness_core::error::{HarnessError, Result};
use h2harness_core::failure::{ExclusionSet, spec_identifier};
use std::fs;
use tracing::debug;

use crate::xml::{XmlDocument, XmlElement};

/// Rewrites a JUnit-style report file in place. Each pass reads the whole
/// document, mutates it and writes it back atomically (temp file + rename).
#[derive(Debug)]
pub struct ReportRewriter {
    path: Utf8PathBuf,
}

impl ReportRewriter {
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// First pass: each suite's `time` becomes the sum of its cases' times,
    /// formatted with five decimal places.
    pub fn aggregate_times(&self) -> Result<()> {
        let mut document = self.load()?;
        for suite in suite_elements_mut(&mut document.root) {
            let mut total = 0.0f64;
            for case in suite.elements("testcase") {
                total += case_time(case)?;
            }
            suite.set_attr("time", format!("{:.5}", total));
        }
        debug!("Aggregated suite times in {}", self.path);
        self.store(&document)
    }

    /// Second pass: suites holding excluded cases are marked skipped
    /// (`errors="0"`, `skipped="1"`) and the excluded cases' identifying
    /// attributes are rewritten under `junit_package`. Everything else is
    /// left alone, so applying the pass twice changes nothing.
    pub fn mark_exclusions_skipped(
        &self,
        exclusions: &ExclusionSet,
        junit_package: &str,
    ) -> Result<()> {
        let mut document = self.load()?;
        let mut current_group = String::new();
        for suite in suite_elements_mut(&mut document.root) {
            if let Some(group) = suite.attr("package") {
                if !group.is_empty() {
                    current_group = group.to_string();
                }
            }

            let mut suite_has_excluded = false;
            for case in suite.elements_mut("testcase") {
                let case_name = case.attr("classname").unwrap_or_default().to_string();
                if !exclusions.contains(&spec_identifier(&current_group, &case_name)) {
                    continue;
                }
                suite_has_excluded = true;

                let case_group = case.attr("package").unwrap_or_default().to_string();
                case.set_attr(
                    "classname",
                    format!("{}.{}", junit_package, case_group.replace('/', "_")),
                );
                case.set_attr("package", "");
                case.set_attr("name", case_name.replace(' ', "_"));
            }

            if suite_has_excluded {
                suite.set_attr("errors", "0");
                suite.set_attr("skipped", "1");
            }
        }
        debug!("Marked excluded cases skipped in {}", self.path);
        self.store(&document)
    }

    fn load(&self) -> Result<XmlDocument> {
        let content = fs::read_to_string(&self.path)
            .map_err(|e| HarnessError::ReportRewrite(format!("Failed to read {}: {}", self.path, e)))?;
        XmlDocument::parse(&content)
            .map_err(|e| HarnessError::ReportRewrite(format!("Failed to parse {}: {}", self.path, e)))
    }

    // Write to file atomically (write to temp, then rename)
    fn store(&self, document: &XmlDocument) -> Result<()> {
        let temp_path = format!("{}.tmp", self.path);
        fs::write(&temp_path, document.to_xml_string())
            .map_err(|e| HarnessError::ReportRewrite(format!("Failed to write {}: {}", temp_path, e)))?;
        fs::rename(&temp_path, &self.path)
            .map_err(|e| HarnessError::ReportRewrite(format!("Failed to replace {}: {}", self.path, e)))?;
        Ok(())
    }
}

fn suite_elements_mut(root: &mut XmlElement) -> Vec<&mut XmlElement> {
    if root.name == "testsuite" {
        vec![root]
    } else {
        root.elements_mut("testsuite").collect()
    }
}

fn case_time(case: &XmlElement) -> Result<f64> {
    let name = case.attr("classname").unwrap_or_default();
    let time = case.attr("time").ok_or_else(|| {
        HarnessError::ReportRewrite(format!("Case {:?} has no time attribute", name))
    })?;
    time.parse().map_err(|_| {
        HarnessError::ReportRewrite(format!("Case {:?} has invalid time {:?}", name, time))
    })
}
