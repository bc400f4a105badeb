pub mod harness;
pub mod target;
pub mod tool;
pub mod verdict;

pub use harness::run;
pub use target::{ServerCommand, ServerHandle, ServerTarget};
pub use verdict::Verdict;
