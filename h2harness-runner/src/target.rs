use h2harness_core::error::{HarnessError, Result};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Connect attempts made before giving up on the server.
const PROBE_ATTEMPTS: u32 = 10;

/// Startup closure for an in-process server target.
pub type StartFn = Box<dyn FnOnce(u16) -> Result<()> + Send + 'static>;

/// The server under test, as something the harness can start on a port of
/// its choosing.
pub enum ServerTarget {
    /// Runs on a dedicated thread inside this process. A returned error or
    /// a panic is handed to the readiness probe through a oneshot channel.
    Function(StartFn),
    /// External process, launched with the chosen port appended as the
    /// final argument and killed on teardown.
    Command(ServerCommand),
}

/// Program plus arguments for a [`ServerTarget::Command`].
#[derive(Debug, Clone)]
pub struct ServerCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ServerCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl ServerTarget {
    pub fn function<F>(start: F) -> Self
    where
        F: FnOnce(u16) -> Result<()> + Send + 'static,
    {
        Self::Function(Box::new(start))
    }

    pub fn command(command: ServerCommand) -> Self {
        Self::Command(command)
    }

    /// Starts the target on `port`. The returned handle tears the server
    /// down when dropped.
    pub fn start(self, port: u16) -> Result<ServerHandle> {
        match self {
            ServerTarget::Function(start) => {
                let (error_tx, error_rx) = oneshot::channel();
                std::thread::Builder::new()
                    .name("server-target".to_owned())
                    .spawn(move || {
                        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(
                            || start(port),
                        ));
                        let error = match outcome {
                            Ok(Ok(())) => return,
                            Ok(Err(e)) => e,
                            Err(panic) => {
                                HarnessError::ServerStartup(panic_description(&*panic))
                            }
                        };
                        let _ = error_tx.send(error);
                    })
                    .map_err(|e| {
                        HarnessError::ServerStartup(format!("Failed to spawn server thread: {e}"))
                    })?;
                debug!("Started in-process server target on port {port}");
                Ok(ServerHandle {
                    port,
                    runtime: TargetRuntime::Thread,
                    error_rx: Some(error_rx),
                })
            }
            ServerTarget::Command(command) => {
                let mut cmd = tokio::process::Command::new(&command.program);
                cmd.args(&command.args)
                    .arg(port.to_string())
                    .kill_on_drop(true);
                let child = cmd.spawn().map_err(|e| {
                    HarnessError::ServerStartup(format!(
                        "Failed to launch {}: {e}",
                        command.program
                    ))
                })?;
                info!("Launched server command {} on port {port}", command.program);
                Ok(ServerHandle {
                    port,
                    runtime: TargetRuntime::Child(child),
                    error_rx: None,
                })
            }
        }
    }
}

enum TargetRuntime {
    Thread,
    Child(tokio::process::Child),
}

/// A started server target. Dropping it stops the server.
pub struct ServerHandle {
    port: u16,
    runtime: TargetRuntime,
    error_rx: Option<oneshot::Receiver<HarnessError>>,
}

impl ServerHandle {
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Error the target reported since the last check, if any. For command
    /// targets, an early non-zero exit counts; a clean early exit does not
    /// and is left for the readiness probe to time out on.
    pub fn take_startup_error(&mut self) -> Option<HarnessError> {
        if let Some(error_rx) = &mut self.error_rx {
            if let Ok(error) = error_rx.try_recv() {
                return Some(error);
            }
        }
        if let TargetRuntime::Child(child) = &mut self.runtime {
            match child.try_wait() {
                Ok(Some(status)) if !status.success() => {
                    return Some(HarnessError::ServerStartup(format!(
                        "Server process exited early with {status}"
                    )));
                }
                Ok(_) => {}
                Err(e) => {
                    return Some(HarnessError::ServerStartup(format!(
                        "Failed to poll server process: {e}"
                    )));
                }
            }
        }
        None
    }

    /// Stops the server. Safe to call more than once.
    pub fn shutdown(&mut self) {
        match &mut self.runtime {
            // The thread was spawned detached; an in-process target lives
            // no longer than the harness process.
            TargetRuntime::Thread => {}
            TargetRuntime::Child(child) => match child.start_kill() {
                Ok(()) => debug!("Stopped server process"),
                // Already exited
                Err(e) if e.kind() == std::io::ErrorKind::InvalidInput => {}
                Err(e) => warn!("Failed to stop server process: {e}"),
            },
        }
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Panic payloads are almost always `&str` or `String`; anything else gets
/// a generic message.
fn panic_description(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("Server thread panicked: {message}")
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("Server thread panicked: {message}")
    } else {
        "Server thread panicked".to_owned()
    }
}

/// Asks the OS for a free port by binding port 0 and releasing it again.
pub fn pick_ephemeral_port() -> Result<u16> {
    let listener = std::net::TcpListener::bind(("0.0.0.0", 0))?;
    Ok(listener.local_addr()?.port())
}

/// Waits until the server accepts TCP connections, probing up to
/// [`PROBE_ATTEMPTS`] times spread over the wait window. Every attempt
/// first surfaces any startup error the target reported in the meantime.
pub async fn wait_for_ready(
    handle: &mut ServerHandle,
    host: &str,
    wait_time_ms: u64,
) -> Result<()> {
    let sleep_time = Duration::from_millis((wait_time_ms / u64::from(PROBE_ATTEMPTS)).max(1));
    let port = handle.port();

    for attempt in 1..=PROBE_ATTEMPTS {
        if let Some(error) = handle.take_startup_error() {
            return Err(error);
        }

        match timeout(sleep_time, TcpStream::connect((host, port))).await {
            Ok(Ok(_)) => {
                debug!("Server ready on {host}:{port} after {attempt} probe(s)");
                return Ok(());
            }
            Ok(Err(e)) => debug!("Probe {attempt}/{PROBE_ATTEMPTS} failed: {e}"),
            Err(_) => debug!("Probe {attempt}/{PROBE_ATTEMPTS} timed out"),
        }

        if attempt < PROBE_ATTEMPTS {
            tokio::time::sleep(sleep_time).await;
        }
    }

    Err(HarnessError::ServerStartup(format!(
        "Server did not accept connections on {host}:{port} within {wait_time_ms} ms \
         ({PROBE_ATTEMPTS} attempts)"
    )))
}
