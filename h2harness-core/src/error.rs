use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Server startup error: {0}")]
    ServerStartup(String),

    #[error("Tool execution error: {0}")]
    ToolExecution(String),

    #[error("Report parse error: {0}")]
    ReportParse(String),

    #[error("Report rewrite error: {0}")]
    ReportRewrite(String),
}

pub type Result<T> = std::result::Result<T, HarnessError>;
