pub mod parser;
pub mod rewrite;
pub mod xml;

pub use parser::{parse_report_dir, parse_report_files};
pub use rewrite::ReportRewriter;
