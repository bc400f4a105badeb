//! Shared fixtures for harness integration tests.
//!
//! Provides `TestEnv` (a `RunConfig` pointed at a temp output directory),
//! a stand-in h2spec executable that copies a canned report into place,
//! and a server target that really listens on its assigned port.

#![allow(dead_code)]

use camino::Utf8PathBuf;
use h2harness_core::config::RunConfig;
use h2harness_core::error::HarnessError;
use h2harness_runner::ServerTarget;
use std::fs;
use tempfile::TempDir;

/// Report with a single failing suite whose identifier is
/// `3.5 - com.example.Case`.
pub const EXCLUDED_ONLY_REPORT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<testsuites>
  <testsuite name="3.5. Stream Concurrency" package="3.5" id="3.5" errors="1" tests="1" time="0">
    <testcase classname="com.example.Case" package="generic/3.5" time="0.1">
      <failure>Expected value
Actual value</failure>
    </testcase>
  </testsuite>
</testsuites>
"#;

/// Report with one excludable failing suite and one genuinely failing one.
pub const MIXED_REPORT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<testsuites>
  <testsuite name="3.5. Stream Concurrency" package="3.5" id="3.5" errors="1" tests="1" time="0">
    <testcase classname="com.example.Case" package="generic/3.5" time="0.1">
      <failure>Expected value
Actual value</failure>
    </testcase>
  </testsuite>
  <testsuite name="4.2. Frame Size" package="4.2" id="4.2" errors="1" tests="1" time="0">
    <testcase classname="Sends a frame exceeding SETTINGS_MAX_FRAME_SIZE" package="generic/4.2" time="0.2">
      <failure>Expected: GOAWAY frame
Actual: DATA frame</failure>
    </testcase>
  </testsuite>
</testsuites>
"#;

/// Report where every case passed.
pub const PASSING_REPORT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<testsuites>
  <testsuite name="3.5. Stream Concurrency" package="3.5" id="3.5" errors="0" tests="1" time="0">
    <testcase classname="com.example.Case" package="generic/3.5" time="0.1" />
  </testsuite>
</testsuites>
"#;

/// A `RunConfig` wired to a temporary output directory.
///
/// The `TempDir` is held so the directory outlives the config that points
/// into it.
pub struct TestEnv {
    pub config: RunConfig,
    pub dir: Utf8PathBuf,
    _tmp: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let dir = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).unwrap();

        let mut config = RunConfig::default();
        config.report.output_directory = dir.clone();
        config.server.wait_time_ms = 2000;
        // Tests use targets that are ready immediately.
        config.server.startup_grace_ms = 0;

        Self {
            config,
            dir,
            _tmp: tmp,
        }
    }
}

/// Write a shell script that behaves like h2spec: it scans its arguments
/// for `-j <path>`, copies `report_body` there, and exits with `exit_code`.
#[cfg(unix)]
pub fn write_fake_tool(env: &TestEnv, report_body: &str, exit_code: i32) -> Utf8PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let body_path = env.dir.join("canned-report.xml");
    fs::write(&body_path, report_body).unwrap();

    let script_path = env.dir.join("fake-h2spec");
    let script = format!(
        "#!/bin/sh\n\
         while [ $# -gt 0 ]; do\n\
         \tcase \"$1\" in\n\
         \t-j) shift; cp \"{body_path}\" \"$1\" ;;\n\
         \tesac\n\
         \tshift\n\
         done\n\
         exit {exit_code}\n"
    );
    fs::write(&script_path, script).unwrap();
    fs::set_permissions(&script_path, fs::Permissions::from_mode(0o755)).unwrap();
    script_path
}

/// Write a shell script that exits without producing any report.
#[cfg(unix)]
pub fn write_silent_tool(env: &TestEnv, exit_code: i32) -> Utf8PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let script_path = env.dir.join("silent-h2spec");
    fs::write(&script_path, format!("#!/bin/sh\nexit {exit_code}\n")).unwrap();
    fs::set_permissions(&script_path, fs::Permissions::from_mode(0o755)).unwrap();
    script_path
}

/// A target that binds the assigned port and accepts connections until the
/// test process exits.
pub fn listening_target() -> ServerTarget {
    ServerTarget::function(|port| {
        let listener = std::net::TcpListener::bind(("127.0.0.1", port))
            .map_err(|e| HarnessError::ServerStartup(e.to_string()))?;
        for _ in listener.incoming() {
            // Accept and immediately drop; readiness probing only needs
            // the connect to succeed.
        }
        Ok(())
    })
}
