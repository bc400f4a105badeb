use h2harness_core::config::RunConfig;
use h2harness_core::error::Result;
use h2harness_core::failure::{ExclusionSet, FailureRecord};
use h2harness_report::{ReportRewriter, parse_report_dir};
use std::fs;
use std::time::Duration;
use tracing::{debug, info};

use crate::target::{ServerHandle, ServerTarget, pick_ephemeral_port, wait_for_ready};
use crate::tool::ConformanceTool;

/// Runs one full conformance pass: start the target, wait for it to accept
/// connections, run h2spec, rewrite its report and return the failures
/// found in it. The server is torn down on every exit path.
pub async fn run(config: &RunConfig, target: ServerTarget) -> Result<Vec<FailureRecord>> {
    if config.skip {
        info!("Conformance run skipped");
        return Ok(Vec::new());
    }
    config.validate()?;

    let port = if config.server.port == 0 {
        pick_ephemeral_port()?
    } else {
        config.server.port
    };

    let mut handle = target.start(port)?;
    let result = run_with_server(config, &mut handle).await;
    handle.shutdown();
    result
}

async fn run_with_server(
    config: &RunConfig,
    handle: &mut ServerHandle,
) -> Result<Vec<FailureRecord>> {
    // Give freshly-started servers a head start before the first probe
    if config.server.startup_grace_ms > 0 {
        tokio::time::sleep(Duration::from_millis(config.server.startup_grace_ms)).await;
    }
    wait_for_ready(
        handle,
        &config.server.host,
        config.server.effective_wait_time_ms(),
    )
    .await?;

    let reports_dir = config.report.reports_dir();
    if !reports_dir.exists() {
        debug!("Creating reports directory {reports_dir}");
        fs::create_dir_all(&reports_dir)?;
    }

    if !config.exclusions.is_empty() {
        info!("Excluded test cases:");
        for exclusion in &config.exclusions {
            info!("  {exclusion}");
        }
    }
    let exclusions = ExclusionSet::new(config.exclusions.clone());

    let tool = ConformanceTool::new(config);
    let report_path = tool.run(handle.port()).await?;

    let rewriter = ReportRewriter::new(report_path);
    rewriter.aggregate_times()?;
    let failures = parse_report_dir(&reports_dir, &exclusions)?;
    rewriter.mark_exclusions_skipped(&exclusions, &config.report.junit_package)?;

    Ok(failures)
}
