//! End-to-end harness runs against a stand-in h2spec executable.
//!
//! Each test starts a real TCP listener as the server under test, points
//! the tool config at a shell script that drops a canned report into the
//! output directory, and checks the records and the rewritten report.

#![cfg(unix)]

mod common;

use common::{
    EXCLUDED_ONLY_REPORT, MIXED_REPORT, PASSING_REPORT, TestEnv, listening_target, write_fake_tool,
};
use h2harness_report::xml::XmlDocument;
use h2harness_runner::{Verdict, run};

#[tokio::test]
async fn excluded_failure_is_reported_ignored_and_marked_skipped() {
    let mut env = TestEnv::new();
    let tool = write_fake_tool(&env, EXCLUDED_ONLY_REPORT, 1);
    env.config.tool.path = Some(tool);
    env.config.exclusions = vec!["3.5 - com.example.Case".to_owned()];

    let records = run(&env.config, listening_target()).await.unwrap();

    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert!(record.ignored);
    assert_eq!(record.spec_identifier(), "3.5 - com.example.Case");
    assert_eq!(record.expected, "Expected value");
    assert_eq!(record.actual, "Actual value");

    let verdict = Verdict::from_records(records);
    assert!(verdict.passed());
    assert!(verdict.evaluate(env.config.ignore_failures));

    let rewritten = std::fs::read_to_string(env.config.report.report_path()).unwrap();
    let doc = XmlDocument::parse(&rewritten).unwrap();
    let suite = doc.root.first_element("testsuite").unwrap();
    assert_eq!(suite.attr("errors"), Some("0"));
    assert_eq!(suite.attr("skipped"), Some("1"));
    assert_eq!(suite.attr("time"), Some("0.10000"));

    let case = suite.first_element("testcase").unwrap();
    assert_eq!(case.attr("classname"), Some("h2spec.generic_3.5"));
    assert_eq!(case.attr("package"), Some(""));
    assert_eq!(case.attr("name"), Some("com.example.Case"));
}

#[tokio::test]
async fn unexcluded_failure_fails_the_verdict() {
    let mut env = TestEnv::new();
    let tool = write_fake_tool(&env, MIXED_REPORT, 1);
    env.config.tool.path = Some(tool);
    env.config.exclusions = vec!["3.5 - com.example.Case".to_owned()];

    let records = run(&env.config, listening_target()).await.unwrap();
    assert_eq!(records.len(), 2);

    let verdict = Verdict::from_records(records);
    assert_eq!(verdict.ignored.len(), 1);
    assert_eq!(verdict.non_ignored.len(), 1);
    assert_eq!(
        verdict.non_ignored[0].spec_identifier(),
        "4.2 - Sends a frame exceeding SETTINGS_MAX_FRAME_SIZE"
    );
    assert!(!verdict.passed());
    assert!(!verdict.evaluate(false));

    // The genuinely failing suite keeps its error count.
    let rewritten = std::fs::read_to_string(env.config.report.report_path()).unwrap();
    let doc = XmlDocument::parse(&rewritten).unwrap();
    let suites: Vec<_> = doc.root.elements("testsuite").collect();
    assert_eq!(suites[0].attr("skipped"), Some("1"));
    assert_eq!(suites[1].attr("errors"), Some("1"));
    assert_eq!(suites[1].attr("skipped"), None);
}

#[tokio::test]
async fn ignore_failures_downgrades_a_failing_verdict() {
    let mut env = TestEnv::new();
    let tool = write_fake_tool(&env, MIXED_REPORT, 1);
    env.config.tool.path = Some(tool);
    env.config.ignore_failures = true;

    let records = run(&env.config, listening_target()).await.unwrap();
    let verdict = Verdict::from_records(records);
    assert!(!verdict.passed());
    assert!(verdict.evaluate(true));
}

#[tokio::test]
async fn passing_report_yields_no_records() {
    let mut env = TestEnv::new();
    let tool = write_fake_tool(&env, PASSING_REPORT, 0);
    env.config.tool.path = Some(tool);

    let records = run(&env.config, listening_target()).await.unwrap();
    assert!(records.is_empty());
    assert!(Verdict::from_records(records).evaluate(false));
}

#[tokio::test]
async fn skip_bypasses_the_target_and_the_tool() {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    let mut env = TestEnv::new();
    env.config.skip = true;

    let started = Arc::new(AtomicBool::new(false));
    let probe = Arc::clone(&started);
    let target = h2harness_runner::ServerTarget::function(move |_| {
        probe.store(true, Ordering::SeqCst);
        Ok(())
    });

    let records = run(&env.config, target).await.unwrap();
    assert!(records.is_empty());
    assert!(!started.load(Ordering::SeqCst));
    assert!(!env.config.report.report_path().as_std_path().exists());
}
