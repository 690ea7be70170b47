//! Applies a rule document, or the built-in arithmetic rules, to a method body.

use super::{load_config, read_body, CliError};
use clap::{Args, ValueHint};
use gravflip_core::encoder::render_assembly;
use gravflip_core::InstructionStream;
use gravflip_transform::document::RuleSetDocument;
use gravflip_transform::library::gravity_arithmetic;
use gravflip_transform::{MethodId, RewriteReport, RuleEngine, RuleSet};
use std::error::Error;
use std::fs;

/// Arguments for the `rewrite` subcommand.
#[derive(Args)]
pub struct RewriteArgs {
    /// Assembly file, or inline assembly with `;` between instructions.
    pub input: String,
    /// JSON rule document. Without it every arithmetic rule is applied.
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub rules: Option<String>,
    /// JSON hook configuration.
    #[arg(long)]
    pub config: Option<String>,
    /// Path to write the rewrite report as JSON.
    #[arg(long, value_name = "PATH")]
    pub emit: Option<String>,
}

impl super::Command for RewriteArgs {
    fn execute(self) -> Result<(), Box<dyn Error>> {
        let stream = read_body(&self.input)?;
        let config = load_config(self.config.as_deref())?;
        let engine = RuleEngine::from_config(&config);
        let (patched, report) = rewrite_body(&stream, self.rules.as_deref(), &engine)?;

        if let Some(path) = self.emit.as_ref() {
            fs::write(path, report.to_json().map_err(CliError::from)?)?;
            tracing::info!("wrote rewrite report to {}", path);
        }
        print!("{}", render_assembly(&patched));
        Ok(())
    }
}

/// Shared by `rewrite` and `run`.
pub(crate) fn rewrite_body(
    stream: &InstructionStream,
    rules: Option<&str>,
    engine: &RuleEngine,
) -> Result<(InstructionStream, RewriteReport), CliError> {
    let (target, rule_set) = load_rules(rules)?;
    Ok(engine.rewrite(&target, &rule_set, stream)?)
}

fn load_rules(path: Option<&str>) -> Result<(MethodId, RuleSet), CliError> {
    match path {
        Some(path) => {
            let document = RuleSetDocument::from_json(&fs::read_to_string(path)?)?;
            Ok(document.compile()?)
        }
        None => Ok((
            MethodId::new("<input>", "body"),
            gravity_arithmetic("arithmetic"),
        )),
    }
}
