pub mod commands;
pub mod handlers;
pub mod output;

pub use commands::{CliArgs, GeneratorArg, OutputFormatArg};
pub use output::{DetectionReport, OutputFormat, OutputFormatter};
