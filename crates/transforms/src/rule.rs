use gravflip_core::pattern::Pattern;
use gravflip_core::TransformId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// How many matches a rule requires.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OccurrenceSpec {
    /// Replace the first match; at least one is required.
    First,
    /// Replace every match. Zero matches fail unless `allow_zero` is set.
    All {
        #[serde(default)]
        allow_zero: bool,
    },
    /// Replace every match; the count must be exactly `n`.
    Exactly(usize),
    /// Replace every match; the count must not exceed `n`.
    AtMost(usize),
}

impl OccurrenceSpec {
    pub const ALL: OccurrenceSpec = OccurrenceSpec::All { allow_zero: false };

    /// Maximum number of rewrites performed, if bounded.
    pub fn limit(self) -> Option<usize> {
        match self {
            OccurrenceSpec::First => Some(1),
            _ => None,
        }
    }

    /// True when `found` rewrites satisfy this requirement.
    pub fn accepts(self, found: usize) -> bool {
        match self {
            OccurrenceSpec::First => found == 1,
            OccurrenceSpec::All { allow_zero } => allow_zero || found > 0,
            OccurrenceSpec::Exactly(n) => found == n,
            OccurrenceSpec::AtMost(n) => found <= n,
        }
    }
}

impl fmt::Display for OccurrenceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OccurrenceSpec::First => f.write_str("1"),
            OccurrenceSpec::All { allow_zero: true } => f.write_str("any number of"),
            OccurrenceSpec::All { allow_zero: false } => f.write_str("at least 1"),
            OccurrenceSpec::Exactly(n) => write!(f, "exactly {n}"),
            OccurrenceSpec::AtMost(n) => write!(f, "at most {n}"),
        }
    }
}

/// What happens at a match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Replacement {
    /// Remove the consumed span and call the transform in its place.
    Substitute(TransformId),
    /// Keep the matched instruction and pass its result through the transform.
    Append(TransformId),
}

impl Replacement {
    pub fn transform(self) -> TransformId {
        match self {
            Replacement::Substitute(t) | Replacement::Append(t) => t,
        }
    }
}

/// A pattern, its replacement and an occurrence requirement. Stateless; one rule can be shared
/// by any number of rule sets.
#[derive(Clone, Debug)]
pub struct RewriteRule {
    pub name: String,
    pub pattern: Pattern,
    pub replacement: Replacement,
    pub occurrence: OccurrenceSpec,
    /// Restart the search at the start (or end, for backward patterns) instead of resuming
    /// where the previous rule stopped.
    pub reset: bool,
}

impl RewriteRule {
    pub fn new(
        name: impl Into<String>,
        pattern: Pattern,
        replacement: Replacement,
        occurrence: OccurrenceSpec,
    ) -> Self {
        Self {
            name: name.into(),
            pattern,
            replacement,
            occurrence,
            reset: false,
        }
    }

    pub fn substitute(name: impl Into<String>, pattern: Pattern, transform: TransformId) -> Self {
        Self::new(
            name,
            pattern,
            Replacement::Substitute(transform),
            OccurrenceSpec::First,
        )
    }

    pub fn with_occurrence(mut self, occurrence: OccurrenceSpec) -> Self {
        self.occurrence = occurrence;
        self
    }

    pub fn with_reset(mut self) -> Self {
        self.reset = true;
        self
    }
}

/// Ordered rules applied against one target with a shared cursor.
#[derive(Clone, Debug, Default)]
pub struct RuleSet {
    name: String,
    rules: Vec<Arc<RewriteRule>>,
}

impl RuleSet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rules: Vec::new(),
        }
    }

    pub fn with_rule(mut self, rule: RewriteRule) -> Self {
        self.rules.push(Arc::new(rule));
        self
    }

    pub fn with_shared(mut self, rule: Arc<RewriteRule>) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rules(&self) -> &[Arc<RewriteRule>] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
