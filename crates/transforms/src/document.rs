//! JSON rule documents.
//!
//! ```json
//! {
//!   "name": "player movement",
//!   "target": { "owner": "Player", "signature": "Move(Vector2)" },
//!   "rules": [
//!     {
//!       "name": "step",
//!       "pattern": [{ "op": "add" }],
//!       "occurrence": { "all": { "allow_zero": false } },
//!       "replacement": { "substitute": "VecAdd" }
//!     }
//!   ]
//! }
//! ```

use crate::hooks::MethodId;
use crate::rule::{OccurrenceSpec, Replacement, RewriteRule, RuleSet};
use crate::{Error, Result};
use gravflip_core::decoder::opcode_for_mnemonic;
use gravflip_core::pattern::{Direction, Pattern, Predicate};
use gravflip_core::{is_rewritable_opcode, TransformId, Value};
use serde::{Deserialize, Serialize};

/// One predicate of a document pattern.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredicateSpec {
    Any,
    /// Opcode by assembly mnemonic, e.g. `"add"` or `"ldarg"`.
    Op(String),
    /// Any of the opcodes the engine rewrites.
    Rewritable,
    CallTo(String),
    CallTransform(TransformId),
    /// Load of the literal, written as in assembly: `"1.5"`, `"(0.0, 1.0)"`.
    Constant(String),
    UnitY,
    Not(Box<PredicateSpec>),
}

impl PredicateSpec {
    pub fn compile(&self) -> Result<Predicate> {
        Ok(match self {
            PredicateSpec::Any => Predicate::any(),
            PredicateSpec::Op(mnemonic) => {
                let op = opcode_for_mnemonic(mnemonic)
                    .ok_or_else(|| Error::Document(format!("unknown mnemonic `{mnemonic}`")))?;
                Predicate::op(op)
            }
            PredicateSpec::Rewritable => {
                Predicate::new("rewritable", |ctx| is_rewritable_opcode(ctx.instr().op))
            }
            PredicateSpec::CallTo(name) => Predicate::call_to(name.as_str()),
            PredicateSpec::CallTransform(transform) => Predicate::call_transform(*transform),
            PredicateSpec::Constant(literal) => {
                let value = literal
                    .parse::<Value>()
                    .map_err(|_| Error::Document(format!("invalid constant `{literal}`")))?;
                Predicate::constant(value)
            }
            PredicateSpec::UnitY => Predicate::unit_y(),
            PredicateSpec::Not(inner) => inner.compile()?.not(),
        })
    }
}

fn first() -> OccurrenceSpec {
    OccurrenceSpec::First
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RuleDocument {
    pub name: String,
    pub pattern: Vec<PredicateSpec>,
    #[serde(default)]
    pub anchor: usize,
    /// Defaults to everything from the anchor to the end of the window.
    #[serde(default)]
    pub consume: Option<usize>,
    #[serde(default)]
    pub direction: Direction,
    #[serde(default = "first")]
    pub occurrence: OccurrenceSpec,
    pub replacement: Replacement,
    #[serde(default)]
    pub reset: bool,
}

impl RuleDocument {
    pub fn compile(&self) -> Result<RewriteRule> {
        let width = self.pattern.len();
        if width == 0 {
            return Err(Error::Document(format!("rule `{}` has an empty pattern", self.name)));
        }
        if self.anchor >= width {
            return Err(Error::Document(format!(
                "rule `{}`: anchor {} outside a {}-instruction pattern",
                self.name, self.anchor, width
            )));
        }
        if let Some(consume) = self.consume {
            if consume == 0 && matches!(self.replacement, Replacement::Substitute(_)) {
                return Err(Error::Document(format!(
                    "rule `{}` substitutes without consuming an instruction",
                    self.name
                )));
            }
            if self.anchor + consume > width {
                return Err(Error::Document(format!(
                    "rule `{}`: consumes past the end of the pattern",
                    self.name
                )));
            }
        }

        let predicates = self
            .pattern
            .iter()
            .map(PredicateSpec::compile)
            .collect::<Result<Vec<_>>>()?;
        let mut pattern = Pattern::new(self.name.as_str(), predicates)
            .with_anchor(self.anchor)
            .with_direction(self.direction);
        if let Some(consume) = self.consume {
            pattern = pattern.with_consume(consume);
        }

        let mut rule = RewriteRule::new(
            self.name.as_str(),
            pattern,
            self.replacement,
            self.occurrence,
        );
        rule.reset = self.reset;
        Ok(rule)
    }
}

/// A rule set and the method it targets.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RuleSetDocument {
    pub name: String,
    pub target: MethodId,
    pub rules: Vec<RuleDocument>,
}

impl RuleSetDocument {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn compile(&self) -> Result<(MethodId, RuleSet)> {
        let rule_set = self
            .rules
            .iter()
            .try_fold(RuleSet::new(self.name.as_str()), |set, rule| {
                Ok::<_, Error>(set.with_rule(rule.compile()?))
            })?;
        Ok((self.target.clone(), rule_set))
    }
}
