//! Applies rule sets to instruction streams.
//!
//! Rewriting is transactional per target: rules run against a clone of the body, and the clone
//! replaces the original only if every rule succeeds and the result still has resolvable
//! branch targets.

use crate::hooks::MethodId;
use crate::rule::{OccurrenceSpec, Replacement, RewriteRule, RuleSet};
use crate::{Error, HookConfig, Result};
use gravflip_core::cursor::Cursor;
use gravflip_core::pattern::Direction;
use gravflip_core::validator::validate_branch_targets;
use gravflip_core::{InstrId, InstructionStream};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Result of one rule.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleOutcome {
    pub rule: String,
    pub replaced: usize,
    /// Identity of the instruction at each rewritten anchor, in rewrite order.
    pub sites: Vec<InstrId>,
}

/// Summary of a successful rule-set application.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewriteReport {
    pub target: String,
    pub rule_set: String,
    pub rules: Vec<RuleOutcome>,
}

impl RewriteReport {
    pub fn total_replaced(&self) -> usize {
        self.rules.iter().map(|outcome| outcome.replaced).sum()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[derive(Clone, Debug)]
pub struct RuleEngine {
    validate_branches: bool,
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self {
            validate_branches: true,
        }
    }
}

impl RuleEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &HookConfig) -> Self {
        Self {
            validate_branches: config.validate_branches,
        }
    }

    /// Applies `rule_set` to `stream` in place. On error `stream` is untouched.
    pub fn apply(
        &self,
        target: &MethodId,
        rule_set: &RuleSet,
        stream: &mut InstructionStream,
    ) -> Result<RewriteReport> {
        let mut working = stream.clone();
        let rules = apply_rules(target, rule_set, &mut working)?;
        if self.validate_branches {
            validate_branch_targets(&working)?;
        }

        let report = RewriteReport {
            target: target.to_string(),
            rule_set: rule_set.name().to_string(),
            rules,
        };
        info!(
            "rewrote {} with `{}`: {} site(s), {} -> {} instructions",
            target,
            rule_set.name(),
            report.total_replaced(),
            stream.len(),
            working.len()
        );
        *stream = working;
        Ok(report)
    }

    /// Like [`RuleEngine::apply`] but leaves `stream` alone and returns the rewritten copy.
    pub fn rewrite(
        &self,
        target: &MethodId,
        rule_set: &RuleSet,
        stream: &InstructionStream,
    ) -> Result<(InstructionStream, RewriteReport)> {
        let mut patched = stream.clone();
        let report = self.apply(target, rule_set, &mut patched)?;
        Ok((patched, report))
    }
}

fn apply_rules(
    target: &MethodId,
    rule_set: &RuleSet,
    stream: &mut InstructionStream,
) -> Result<Vec<RuleOutcome>> {
    let mut cursor = Cursor::new(stream);
    let mut outcomes = Vec::with_capacity(rule_set.len());

    for (position, rule) in rule_set.rules().iter().enumerate() {
        if position == 0 || rule.reset {
            match rule.pattern.direction() {
                Direction::Forward => cursor.reset(),
                Direction::Backward => cursor.goto_end(),
            }
        }

        let outcome = apply_rule(&mut cursor, rule)?;
        check_occurrence(target, rule, outcome.replaced)?;
        debug!(
            "  {:<28} {} site(s) {:?}",
            rule.name, outcome.replaced, outcome.sites
        );
        outcomes.push(outcome);
    }
    Ok(outcomes)
}

fn apply_rule(cursor: &mut Cursor<'_>, rule: &RewriteRule) -> Result<RuleOutcome> {
    let pattern = &rule.pattern;
    let direction = pattern.direction();
    let limit = rule.occurrence.limit();
    let mut sites = Vec::new();

    while limit.map_or(true, |limit| sites.len() < limit) {
        if !cursor.seek(pattern, direction) {
            break;
        }
        let start = cursor.index();
        let anchor = start + pattern.anchor();
        let Some(site) = cursor.stream().get(anchor).map(|instr| instr.id) else {
            break;
        };

        match rule.replacement {
            Replacement::Substitute(transform) => {
                cursor.goto(anchor)?;
                cursor.insert_replacement_call(transform)?;
                cursor.remove_current(pattern.consume())?;
            }
            Replacement::Append(transform) => {
                cursor.goto(anchor + 1)?;
                cursor.insert_replacement_call(transform)?;
            }
        }
        sites.push(site);

        if direction == Direction::Backward {
            if start == 0 {
                break;
            }
            cursor.goto(start - 1)?;
        }
    }

    Ok(RuleOutcome {
        rule: rule.name.clone(),
        replaced: sites.len(),
        sites,
    })
}

fn check_occurrence(target: &MethodId, rule: &RewriteRule, found: usize) -> Result<()> {
    if rule.occurrence.accepts(found) {
        return Ok(());
    }
    match rule.occurrence {
        OccurrenceSpec::First | OccurrenceSpec::All { .. } => Err(Error::PatternNotFound {
            rule: rule.name.clone(),
            target: target.to_string(),
        }),
        OccurrenceSpec::Exactly(_) | OccurrenceSpec::AtMost(_) => {
            Err(Error::OccurrenceCountMismatch {
                rule: rule.name.clone(),
                target: target.to_string(),
                expected: rule.occurrence.to_string(),
                found,
            })
        }
    }
}
