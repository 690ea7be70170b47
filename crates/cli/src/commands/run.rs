//! Evaluates a method body under a chosen orientation with the reference interpreter.

use super::rewrite::rewrite_body;
use super::{load_config, read_body, CliError};
use clap::{Args, ValueEnum};
use gravflip_core::Value;
use gravflip_gravity::{GravityCoordinator, GravityRequest};
use gravflip_transform::{Interpreter, NoHostCalls, RuleEngine};
use std::error::Error;

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum Orientation {
    Normal,
    Inverted,
}

/// Arguments for the `run` subcommand.
#[derive(Args)]
pub struct RunArgs {
    /// Assembly file, or inline assembly with `;` between instructions.
    pub input: String,
    /// Orientation the body is evaluated under.
    #[arg(long, value_enum, default_value = "normal")]
    pub gravity: Orientation,
    /// Argument values in order, e.g. `--arg "(0.0, 10.0)" --arg 2.5`.
    #[arg(long = "arg", value_name = "VALUE")]
    pub args: Vec<String>,
    /// Rewrite with this rule document before running.
    #[arg(long)]
    pub rules: Option<String>,
    /// Rewrite with the built-in arithmetic rules before running.
    #[arg(long, conflicts_with = "rules")]
    pub patch: bool,
    /// JSON hook configuration.
    #[arg(long)]
    pub config: Option<String>,
}

impl super::Command for RunArgs {
    fn execute(self) -> Result<(), Box<dyn Error>> {
        let config = load_config(self.config.as_deref())?;
        let mut stream = read_body(&self.input)?;
        if self.rules.is_some() || self.patch {
            let engine = RuleEngine::from_config(&config);
            let (patched, report) = rewrite_body(&stream, self.rules.as_deref(), &engine)?;
            tracing::info!("patched {} site(s) before running", report.total_replaced());
            stream = patched;
        }

        let args = self
            .args
            .iter()
            .map(|raw| {
                raw.parse::<Value>()
                    .map_err(|_| CliError::InvalidArgument(format!("bad value `{raw}`")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let gravity = GravityCoordinator::default();
        if let Orientation::Inverted = self.gravity {
            gravity.set_gravity(GravityRequest::Inverted, 1.0, false);
        }

        let result = Interpreter::with_config(&gravity, &config)
            .run(&stream, &args, &mut NoHostCalls)
            .map_err(CliError::from)?;
        match result {
            Some(value) => println!("{value}"),
            None => println!("(no value)"),
        }
        Ok(())
    }
}
