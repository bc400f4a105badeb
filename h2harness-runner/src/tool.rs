use camino::{Utf8Path, Utf8PathBuf};
use h2harness_core::config::{ExecutionMode, RunConfig, ToolConfig};
use h2harness_core::error::{HarnessError, Result};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::time::timeout;
use tracing::{debug, info};

/// Log line h2spec prints once the whole run is over.
const COMPLETION_MARKER: &str = "Finished in ";
/// Hostname that resolves to the host from inside a container.
const BRIDGE_HOST: &str = "host.docker.internal";
/// Mount point of the report directory inside the container.
const CONTAINER_REPORT_DIR: &str = "/reports";

/// One invocation of the h2spec conformance tool, as a local subprocess or
/// a docker container.
pub struct ConformanceTool<'a> {
    config: &'a RunConfig,
}

impl<'a> ConformanceTool<'a> {
    pub fn new(config: &'a RunConfig) -> Self {
        Self { config }
    }

    /// Runs h2spec against the server on `port` and returns the path of the
    /// report it wrote.
    pub async fn run(&self, port: u16) -> Result<Utf8PathBuf> {
        let report_path = self.config.report.report_path();
        match self.config.tool.mode {
            ExecutionMode::Local => self.run_local(port, &report_path).await?,
            ExecutionMode::Container => self.run_container(port).await?,
        }
        if !report_path.exists() {
            return Err(HarnessError::ToolExecution(format!(
                "h2spec produced no report at {report_path}"
            )));
        }
        Ok(report_path)
    }

    async fn run_local(&self, port: u16, report_path: &Utf8Path) -> Result<()> {
        let executable = resolve_executable(&self.config.tool)?;
        ensure_executable(&executable)?;

        let args = tool_args(&self.config.tool, None, port, report_path.as_str());
        info!("Running {} {}", executable, args.join(" "));

        // Output goes straight to our own stdio
        let status = Command::new(executable.as_str())
            .args(&args)
            .status()
            .await
            .map_err(|e| {
                HarnessError::ToolExecution(format!("Failed to launch {executable}: {e}"))
            })?;
        check_exit_status(status)
    }

    async fn run_container(&self, port: u16) -> Result<()> {
        let reports_dir = self.config.report.reports_dir();
        let mount_source = reports_dir.canonicalize_utf8().map_err(|e| {
            HarnessError::ToolExecution(format!("Cannot resolve {reports_dir}: {e}"))
        })?;
        let container_report = format!("{}/{}", CONTAINER_REPORT_DIR, self.config.report.file_name);
        let image = self.config.tool.image_reference();
        let args = tool_args(&self.config.tool, Some(BRIDGE_HOST), port, &container_report);

        info!("Running containerized {} against port {port}", image);
        let mut child = Command::new("docker")
            .arg("run")
            .arg("--rm")
            .arg("--add-host")
            .arg(format!("{BRIDGE_HOST}:host-gateway"))
            .arg("-v")
            .arg(format!("{mount_source}:{CONTAINER_REPORT_DIR}"))
            .arg(&image)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| HarnessError::ToolExecution(format!("Failed to launch docker: {e}")))?;

        let completion_timeout = Duration::from_secs(self.config.tool.completion_timeout_secs);
        let marker_seen = match timeout(completion_timeout, stream_logs(&mut child)).await {
            Ok(result) => result?,
            Err(_) => {
                let _ = child.start_kill();
                return Err(HarnessError::ToolExecution(format!(
                    "Timed out after {}s waiting for log output matching {COMPLETION_MARKER:?}",
                    self.config.tool.completion_timeout_secs
                )));
            }
        };
        if !marker_seen {
            let _ = child.wait().await;
            return Err(HarnessError::ToolExecution(format!(
                "Container log stream ended without {COMPLETION_MARKER:?}"
            )));
        }

        let status = child
            .wait()
            .await
            .map_err(|e| HarnessError::ToolExecution(format!("Failed to wait for docker: {e}")))?;
        check_exit_status(status)
    }
}

/// h2spec's command line. A local run relies on the tool's own default
/// host; a container run must name the bridge address back to the host.
fn tool_args(tool: &ToolConfig, host: Option<&str>, port: u16, report_path: &str) -> Vec<String> {
    let mut args = Vec::new();
    if let Some(host) = host {
        args.push("-h".to_owned());
        args.push(host.to_owned());
    }
    args.extend([
        "-p".to_owned(),
        port.to_string(),
        "-j".to_owned(),
        report_path.to_owned(),
        "-o".to_owned(),
        tool.timeout_secs.to_string(),
        "--max-header-length".to_owned(),
        tool.max_header_length.to_string(),
    ]);
    if tool.verbose {
        args.push("-v".to_owned());
    }
    args
}

/// Order of precedence: explicit `tool.path`, the platform binary under
/// `tool.tool_dir`, then whatever `h2spec` resolves to on PATH.
fn resolve_executable(tool: &ToolConfig) -> Result<Utf8PathBuf> {
    if let Some(path) = &tool.path {
        if !path.exists() {
            return Err(HarnessError::ToolExecution(format!(
                "h2spec not found at {path}"
            )));
        }
        return Ok(path.clone());
    }
    if let Some(dir) = &tool.tool_dir {
        let candidate = dir.join(platform_binary_name());
        if candidate.exists() {
            return Ok(candidate);
        }
        return Err(HarnessError::ToolExecution(format!(
            "h2spec not found under {dir}"
        )));
    }
    Ok(Utf8PathBuf::from("h2spec"))
}

#[cfg(target_os = "windows")]
fn platform_binary_name() -> &'static str {
    "h2spec.exe"
}

#[cfg(not(target_os = "windows"))]
fn platform_binary_name() -> &'static str {
    "h2spec"
}

#[cfg(unix)]
fn ensure_executable(path: &Utf8Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    // A bare PATH lookup is left to the OS
    if !path.exists() {
        return Ok(());
    }
    let mut permissions = std::fs::metadata(path)?.permissions();
    if permissions.mode() & 0o111 == 0 {
        permissions.set_mode(permissions.mode() | 0o755);
        std::fs::set_permissions(path, permissions).map_err(|e| {
            HarnessError::ToolExecution(format!("Cannot make {path} executable: {e}"))
        })?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn ensure_executable(_path: &Utf8Path) -> Result<()> {
    Ok(())
}

/// Forwards the container's stdout and stderr to the log until both close,
/// reporting whether the completion marker was seen.
async fn stream_logs(child: &mut Child) -> Result<bool> {
    let stdout = child.stdout.take().ok_or_else(|| {
        HarnessError::ToolExecution("Container stdout was not captured".to_owned())
    })?;
    let stderr = child.stderr.take().ok_or_else(|| {
        HarnessError::ToolExecution("Container stderr was not captured".to_owned())
    })?;
    let mut stdout_lines = BufReader::new(stdout).lines();
    let mut stderr_lines = BufReader::new(stderr).lines();

    let mut marker_seen = false;
    let mut stdout_open = true;
    let mut stderr_open = true;
    while stdout_open || stderr_open {
        let line = tokio::select! {
            line = stdout_lines.next_line(), if stdout_open => match line {
                Ok(Some(line)) => Some(line),
                Ok(None) => {
                    stdout_open = false;
                    None
                }
                Err(e) => {
                    return Err(HarnessError::ToolExecution(format!(
                        "Failed to read container logs: {e}"
                    )));
                }
            },
            line = stderr_lines.next_line(), if stderr_open => match line {
                Ok(Some(line)) => Some(line),
                Ok(None) => {
                    stderr_open = false;
                    None
                }
                Err(e) => {
                    return Err(HarnessError::ToolExecution(format!(
                        "Failed to read container logs: {e}"
                    )));
                }
            },
        };
        if let Some(line) = line {
            debug!("h2spec: {line}");
            if line.starts_with(COMPLETION_MARKER) {
                marker_seen = true;
            }
        }
    }
    Ok(marker_seen)
}

// h2spec exits 0 when every case passed and 1 when some failed; both leave
// a usable report behind.
fn check_exit_status(status: ExitStatus) -> Result<()> {
    match status.code() {
        Some(0) | Some(1) => Ok(()),
        Some(code) => Err(HarnessError::ToolExecution(format!(
            "h2spec exited with unexpected status {code}"
        ))),
        None => Err(HarnessError::ToolExecution(
            "h2spec was terminated by a signal".to_owned(),
        )),
    }
}
