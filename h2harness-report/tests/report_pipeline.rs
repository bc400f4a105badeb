//! End-to-end pass over a realistic report file: aggregate times, lift out
//! failure records, then mark excluded cases skipped.

use camino::Utf8PathBuf;
use h2harness_core::failure::ExclusionSet;
use h2harness_report::xml::XmlDocument;
use h2harness_report::{ReportRewriter, parse_report_dir};
use std::fs;

const REPORT: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
<testsuites>\n\
  <testsuite name=\"3.5\" package=\"3.5\" id=\"3.5\" tests=\"1\" errors=\"1\" time=\"0\">\n\
    <testcase classname=\"com.example.Case\" package=\"generic/3.5\" time=\"0.12345678\">\n\
      <failure>Expected value\nActual value</failure>\n\
    </testcase>\n\
  </testsuite>\n\
  <testsuite name=\"4.2\" package=\"4.2\" id=\"4.2\" tests=\"2\" errors=\"1\" time=\"0\">\n\
    <testcase classname=\"Sends a dynamic table size update\" package=\"hpack/4.2\" time=\"0.5\">\n\
      <failure>Error code: COMPRESSION_ERROR\nConnection closed</failure>\n\
    </testcase>\n\
    <testcase classname=\"Sends a header field\" package=\"hpack/4.2\" time=\"0.25\"/>\n\
  </testsuite>\n\
</testsuites>\n";

#[test]
fn report_flows_through_all_passes() {
    let dir = tempfile::tempdir().unwrap();
    let reports_dir = Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();
    let report_path = reports_dir.join("TEST-h2spec.xml");
    fs::write(&report_path, REPORT).unwrap();

    let exclusions = ExclusionSet::new(["3.5 - com.example.Case"]);
    let rewriter = ReportRewriter::new(report_path.clone());

    rewriter.aggregate_times().unwrap();
    let records = parse_report_dir(&reports_dir, &exclusions).unwrap();
    rewriter
        .mark_exclusions_skipped(&exclusions, "h2spec")
        .unwrap();

    // Both failing cases were lifted out, the excluded one marked ignored;
    // the passing case in suite 4.2 contributes nothing
    assert_eq!(records.len(), 2);
    let excluded = &records[0];
    assert_eq!(excluded.spec_identifier(), "3.5 - com.example.Case");
    assert_eq!(excluded.expected, "Expected value");
    assert_eq!(excluded.actual, "Actual value");
    assert!(excluded.ignored);
    assert!(records[1..].iter().all(|r| !r.ignored));
    assert_eq!(records[1].group_name, "4.2");

    let doc = XmlDocument::parse(&fs::read_to_string(&report_path).unwrap()).unwrap();
    let suites: Vec<_> = doc.root.elements("testsuite").collect();

    // Pass one: suite time is the sum of case times, five decimal places
    assert_eq!(suites[0].attr("time"), Some("0.12346"));
    assert_eq!(suites[1].attr("time"), Some("0.75000"));

    // Pass two: the excluded suite is skipped and its case renamed
    assert_eq!(suites[0].attr("errors"), Some("0"));
    assert_eq!(suites[0].attr("skipped"), Some("1"));
    let case = suites[0].first_element("testcase").unwrap();
    assert_eq!(case.attr("classname"), Some("h2spec.generic_3.5"));
    assert_eq!(case.attr("package"), Some(""));
    assert_eq!(case.attr("name"), Some("com.example.Case"));

    // The non-excluded suite keeps its identity
    assert_eq!(suites[1].attr("errors"), Some("1"));
    assert_eq!(suites[1].attr("skipped"), None);
    assert_eq!(
        suites[1].first_element("testcase").unwrap().attr("classname"),
        Some("Sends a dynamic table size update")
    );
}

#[test]
fn passes_are_stable_when_reapplied() {
    let dir = tempfile::tempdir().unwrap();
    let reports_dir = Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();
    let report_path = reports_dir.join("TEST-h2spec.xml");
    fs::write(&report_path, REPORT).unwrap();

    let exclusions = ExclusionSet::new(["3.5 - com.example.Case"]);
    let rewriter = ReportRewriter::new(report_path.clone());

    rewriter.aggregate_times().unwrap();
    rewriter
        .mark_exclusions_skipped(&exclusions, "h2spec")
        .unwrap();
    let first = fs::read_to_string(&report_path).unwrap();

    rewriter.aggregate_times().unwrap();
    rewriter
        .mark_exclusions_skipped(&exclusions, "h2spec")
        .unwrap();
    let second = fs::read_to_string(&report_path).unwrap();

    assert_eq!(first, second);
}
