use anyhow::Result;
use clap::Parser;
use h2harness_core::config::{ExecutionMode, RunConfig};
use tracing::info;

mod app;

#[derive(Parser, Debug)]
#[command(author, version, about = "h2harness - HTTP/2 conformance test harness", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Host the server under test listens on
    #[arg(long)]
    host: Option<String>,

    /// Port for the server under test (0 picks a free port)
    #[arg(short, long)]
    port: Option<u16>,

    /// Milliseconds to wait for the server to accept connections
    #[arg(long)]
    wait_time: Option<u64>,

    /// Path to a local h2spec executable
    #[arg(long)]
    tool_path: Option<String>,

    /// Run h2spec from its container image instead of a local executable
    #[arg(long)]
    container: bool,

    /// Per-case timeout in seconds passed to h2spec
    #[arg(long)]
    timeout: Option<u64>,

    /// Maximum header length passed to h2spec
    #[arg(long)]
    max_header_length: Option<u32>,

    /// Directory the JUnit report is written beneath
    #[arg(short, long)]
    output_dir: Option<String>,

    /// Test case identifier to exclude, e.g. "3.5 - Sends a HEADERS frame"; repeatable
    #[arg(short = 'x', long = "exclude", value_name = "IDENTIFIER")]
    exclude: Vec<String>,

    /// Report remaining failures without failing the run
    #[arg(long)]
    ignore_failures: bool,

    /// Skip the conformance run entirely
    #[arg(long)]
    skip: bool,

    /// Enable verbose logging (also passed through to h2spec)
    #[arg(short, long)]
    verbose: bool,

    /// Command that starts the server under test; the chosen port is appended
    /// as its final argument
    #[arg(last = true, value_name = "COMMAND")]
    server_command: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    info!("Starting h2harness v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config = if let Some(config_path) = args.config {
        RunConfig::load_from_path(config_path)?
    } else {
        RunConfig::load_or_default()
    };

    // Override with CLI arguments
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(wait_time) = args.wait_time {
        config.server.wait_time_ms = wait_time;
    }
    if let Some(tool_path) = args.tool_path {
        config.tool.path = Some(tool_path.into());
    }
    if args.container {
        config.tool.mode = ExecutionMode::Container;
    }
    if let Some(timeout) = args.timeout {
        config.tool.timeout_secs = timeout;
    }
    if let Some(max_header_length) = args.max_header_length {
        config.tool.max_header_length = max_header_length;
    }
    if let Some(output_dir) = args.output_dir {
        config.report.output_directory = output_dir.into();
    }
    if args.verbose {
        config.tool.verbose = true;
    }
    config.exclusions.extend(args.exclude);
    if args.ignore_failures {
        config.ignore_failures = true;
    }
    if args.skip {
        config.skip = true;
    }

    config.validate()?;

    info!("Configuration loaded");
    info!("Report: {}", config.report.report_path());

    app::run(config, args.server_command).await
}
