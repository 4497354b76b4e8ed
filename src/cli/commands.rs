use clap::{Parser, ValueEnum};
use genai::adapter::AdapterKind;
use std::path::PathBuf;

use crate::config::{parse_provider, GeneratorKind};
use crate::util::logging::parse_level;

/// Detect an application's stack and produce a verified Dockerfile for it
#[derive(Parser, Debug)]
#[command(
    name = "stackpack",
    about = "Detect an application's stack and produce a verified Dockerfile for it",
    version,
    long_about = "stackpack inspects a repository, identifies its stack (Spring Boot on \
                  Maven or Gradle, React, Node servers), derives build facts and generates \
                  a Dockerfile, then proves it by building it, feeding failures back into \
                  a fix step until it builds or the attempt budget runs out.\n\n\
                  Examples:\n  \
                  stackpack\n  \
                  stackpack /path/to/repo --attempts 5\n  \
                  stackpack --detect-only --format json\n  \
                  stackpack --generator llm --provider openai --model gpt-4o-mini --run"
)]
pub struct CliArgs {
    #[arg(
        value_name = "PATH",
        help = "Path to repository (defaults to current directory)"
    )]
    pub repository_path: Option<PathBuf>,

    #[arg(long, value_name = "N", help = "Maximum number of builds [default: 3]")]
    pub attempts: Option<u32>,

    #[arg(
        long,
        value_name = "MINUTES",
        help = "Overall time budget in minutes [default: 15]"
    )]
    pub timeout: Option<u64>,

    #[arg(
        long,
        value_name = "FILE",
        help = "Stack description (JSON or YAML) to use instead of detection"
    )]
    pub spec: Option<PathBuf>,

    #[arg(long, value_enum, help = "Build file generator [default: template]")]
    pub generator: Option<GeneratorArg>,

    #[arg(
        long,
        value_parser = parse_provider_arg,
        help = "LLM provider for the llm generator (ollama, openai, claude, gemini, grok, groq)"
    )]
    pub provider: Option<AdapterKind>,

    #[arg(long, value_name = "MODEL", help = "Model name (provider-specific)")]
    pub model: Option<String>,

    #[arg(long, help = "Run the built image and wait for its health endpoint")]
    pub run: bool,

    #[arg(long, help = "Print detected stack and facts without building")]
    pub detect_only: bool,

    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Output format for --detect-only"
    )]
    pub format: OutputFormatArg,

    #[arg(
        short = 'o',
        long,
        value_name = "FILE",
        help = "Where to write the Dockerfile (defaults to <PATH>/Dockerfile)"
    )]
    pub output: Option<PathBuf>,

    #[arg(long, value_name = "N", help = "Directory depth scanned for manifests [default: 4]")]
    pub max_depth: Option<usize>,

    #[arg(long, value_name = "LEVEL", value_parser = parse_level_arg, help = "Set logging level")]
    pub log_level: Option<String>,

    #[arg(short = 'v', long, help = "Verbose logging")]
    pub verbose: bool,

    #[arg(
        short = 'q',
        long,
        conflicts_with = "verbose",
        help = "Quiet mode - suppress non-error output"
    )]
    pub quiet: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorArg {
    Template,
    Llm,
}

impl From<GeneratorArg> for GeneratorKind {
    fn from(arg: GeneratorArg) -> Self {
        match arg {
            GeneratorArg::Template => GeneratorKind::Template,
            GeneratorArg::Llm => GeneratorKind::Llm,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormatArg {
    Json,
    Yaml,
    Human,
}

impl From<OutputFormatArg> for super::output::OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Json => super::output::OutputFormat::Json,
            OutputFormatArg::Yaml => super::output::OutputFormat::Yaml,
            OutputFormatArg::Human => super::output::OutputFormat::Human,
        }
    }
}

fn parse_provider_arg(s: &str) -> Result<AdapterKind, String> {
    parse_provider(s).map_err(|e| e.to_string())
}

fn parse_level_arg(s: &str) -> Result<String, String> {
    parse_level(s)
        .map(|_| s.to_lowercase())
        .ok_or_else(|| format!("Invalid log level: {}. Valid levels: trace, debug, info, warn, error", s))
}
