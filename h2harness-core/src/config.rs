use crate::error::{HarnessError, Result};
use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RunConfig {
    /// Skip the conformance run entirely.
    #[serde(default)]
    pub skip: bool,
    /// Report failures but never fail the run.
    #[serde(default)]
    pub ignore_failures: bool,
    /// Spec identifiers ("<group> - <classname>") whose failures are expected.
    #[serde(default)]
    pub exclusions: Vec<String>,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub tool: ToolConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    /// 0 picks an ephemeral port at run time.
    #[serde(default)]
    pub port: u16,
    #[serde(default = "default_wait_time_ms")]
    pub wait_time_ms: u64,
    #[serde(default = "default_startup_grace_ms")]
    pub startup_grace_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ToolConfig {
    #[serde(default)]
    pub mode: ExecutionMode,
    /// Explicit path to the h2spec executable.
    pub path: Option<Utf8PathBuf>,
    /// Directory holding a pre-extracted h2spec binary for this platform.
    pub tool_dir: Option<Utf8PathBuf>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_header_length")]
    pub max_header_length: u32,
    #[serde(default)]
    pub verbose: bool,
    #[serde(default = "default_image")]
    pub image: String,
    #[serde(default = "default_tool_version")]
    pub version: String,
    /// How long to wait for the container log completion marker.
    #[serde(default = "default_completion_timeout_secs")]
    pub completion_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReportConfig {
    #[serde(default = "default_output_directory")]
    pub output_directory: Utf8PathBuf,
    #[serde(default = "default_report_file_name")]
    pub file_name: String,
    #[serde(default = "default_junit_package")]
    pub junit_package: String,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    #[default]
    Local,
    Container,
}

impl ServerConfig {
    /// Probe window in milliseconds, with the unset value mapped to the default.
    pub fn effective_wait_time_ms(&self) -> u64 {
        if self.wait_time_ms == 0 {
            default_wait_time_ms()
        } else {
            self.wait_time_ms
        }
    }
}

impl ToolConfig {
    pub fn image_reference(&self) -> String {
        format!("{}:{}", self.image, self.version)
    }
}

impl ReportConfig {
    /// Directory the tool writes reports into and the parser reads from.
    pub fn reports_dir(&self) -> Utf8PathBuf {
        self.output_directory.join("reports")
    }

    pub fn report_path(&self) -> Utf8PathBuf {
        self.reports_dir().join(&self.file_name)
    }
}

// Default value functions
fn default_host() -> String {
    "127.0.0.1".to_owned()
}

const fn default_wait_time_ms() -> u64 {
    10000
}

const fn default_startup_grace_ms() -> u64 {
    500
}

const fn default_timeout_secs() -> u64 {
    2
}

const fn default_max_header_length() -> u32 {
    4000
}

fn default_image() -> String {
    "summerwind/h2spec".to_owned()
}

fn default_tool_version() -> String {
    "2.4.0".to_owned()
}

const fn default_completion_timeout_secs() -> u64 {
    60
}

fn default_output_directory() -> Utf8PathBuf {
    Utf8PathBuf::from("target")
}

fn default_report_file_name() -> String {
    "TEST-h2spec.xml".to_owned()
}

fn default_junit_package() -> String {
    "h2spec".to_owned()
}

impl RunConfig {
    pub fn load() -> Result<Self> {
        let config_path = Self::find_config_file()?;
        Self::load_from_path(&config_path)
    }

    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| HarnessError::Config(format!("Failed to read config: {}", e)))?;

        let mut config: RunConfig = toml::from_str(&content)
            .map_err(|e| HarnessError::Config(format!("Failed to parse config: {}", e)))?;

        config.expand_paths();
        config.validate()?;
        Ok(config)
    }

    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|_| Self::default())
    }

    fn find_config_file() -> Result<PathBuf> {
        let candidates = [
            Some(PathBuf::from("h2harness.toml")),
            dirs::config_dir().map(|p| p.join("h2harness/h2harness.toml")),
        ];

        for candidate in candidates.into_iter().flatten() {
            if candidate.exists() {
                return Ok(candidate);
            }
        }

        Err(HarnessError::Config("Config file not found".to_owned()))
    }

    fn expand_paths(&mut self) {
        // Helper function to expand tilde
        fn expand_tilde(path: &Utf8PathBuf) -> Utf8PathBuf {
            let path_str = path.as_str();
            if path_str.starts_with("~/") {
                if let Some(home) = dirs::home_dir() {
                    if let Some(home_str) = home.to_str() {
                        return Utf8PathBuf::from(path_str.replacen("~", home_str, 1));
                    }
                }
            }
            path.clone()
        }

        self.report.output_directory = expand_tilde(&self.report.output_directory);
        if let Some(path) = &self.tool.path {
            self.tool.path = Some(expand_tilde(path));
        }
        if let Some(dir) = &self.tool.tool_dir {
            self.tool.tool_dir = Some(expand_tilde(dir));
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.report.file_name.is_empty() {
            return Err(HarnessError::Config(
                "Report file name must not be empty".to_owned(),
            ));
        }
        if self.report.file_name.contains(['/', '\\']) {
            return Err(HarnessError::Config(format!(
                "Report file name must not contain path separators: {}",
                self.report.file_name
            )));
        }
        if self.server.host.is_empty() {
            return Err(HarnessError::Config(
                "Server host must not be empty".to_owned(),
            ));
        }
        if self.tool.timeout_secs == 0 {
            return Err(HarnessError::Config(
                "Tool timeout must be at least one second".to_owned(),
            ));
        }
        Ok(())
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            skip: false,
            ignore_failures: false,
            exclusions: Vec::new(),
            server: ServerConfig::default(),
            tool: ToolConfig::default(),
            report: ReportConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: 0,
            wait_time_ms: default_wait_time_ms(),
            startup_grace_ms: default_startup_grace_ms(),
        }
    }
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::default(),
            path: None,
            tool_dir: None,
            timeout_secs: default_timeout_secs(),
            max_header_length: default_max_header_length(),
            verbose: false,
            image: default_image(),
            version: default_tool_version(),
            completion_timeout_secs: default_completion_timeout_secs(),
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_directory: default_output_directory(),
            file_name: default_report_file_name(),
            junit_package: default_junit_package(),
        }
    }
}
