use clap::Subcommand;
use gravflip_core::decoder::parse_assembly;
use gravflip_core::InstructionStream;
use gravflip_transform::HookConfig;
use std::error::Error;
use std::fs;
use std::path::Path;

pub mod decode;
pub mod rewrite;
pub mod run;

use thiserror::Error;

/// Errors raised by CLI subcommands.
#[derive(Debug, Error)]
pub enum CliError {
    /// File read/write error.
    #[error("file error: {0}")]
    File(#[from] std::io::Error),
    /// Assembly could not be decoded.
    #[error("decode error: {0}")]
    Decode(#[from] gravflip_core::Error),
    /// Rewrite or evaluation failed.
    #[error("transform error: {0}")]
    Transform(#[from] gravflip_transform::Error),
    /// JSON serialization error.
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    /// Invalid command line value.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// CLI subcommands for Gravflip.
#[derive(Subcommand)]
pub enum Cmd {
    /// Decode and validate a method body, then print it in canonical form.
    Decode(decode::DecodeArgs),
    /// Apply a rule document to a method body.
    Rewrite(rewrite::RewriteArgs),
    /// Evaluate a method body under a gravity orientation.
    Run(run::RunArgs),
}

/// Trait for executing CLI subcommands.
pub trait Command {
    /// Executes the subcommand.
    fn execute(self) -> Result<(), Box<dyn Error>>;
}

impl Command for Cmd {
    fn execute(self) -> Result<(), Box<dyn Error>> {
        match self {
            Cmd::Decode(args) => args.execute(),
            Cmd::Rewrite(args) => args.execute(),
            Cmd::Run(args) => args.execute(),
        }
    }
}

/// Reads assembly from a file path, or treats the argument as inline assembly.
pub(crate) fn read_body(input: &str) -> Result<InstructionStream, CliError> {
    let text = if Path::new(input).is_file() {
        fs::read_to_string(input)?
    } else {
        // inline bodies separate instructions with `;`
        input.replace(';', "\n")
    };
    Ok(parse_assembly(&text)?)
}

/// Loads a JSON config file, or the defaults.
pub(crate) fn load_config(path: Option<&str>) -> Result<HookConfig, CliError> {
    match path {
        Some(path) => Ok(HookConfig::from_json(&fs::read_to_string(path)?)?),
        None => Ok(HookConfig::default()),
    }
}
