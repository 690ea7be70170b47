//! Parses a method body, checks its branch targets and prints it in canonical form.

use super::{read_body, CliError};
use clap::Args;
use gravflip_core::encoder::render_assembly;
use gravflip_core::validator::validate_branch_targets;
use std::error::Error;

/// Arguments for the `decode` subcommand.
#[derive(Args)]
pub struct DecodeArgs {
    /// Assembly file, or inline assembly with `;` between instructions.
    pub input: String,
    /// Print the decoded instructions as JSON instead of assembly.
    #[arg(long)]
    pub json: bool,
}

impl super::Command for DecodeArgs {
    fn execute(self) -> Result<(), Box<dyn Error>> {
        let stream = read_body(&self.input)?;
        validate_branch_targets(&stream).map_err(CliError::from)?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(stream.as_slice())?);
        } else {
            print!("{}", render_assembly(&stream));
        }
        Ok(())
    }
}
