//! Prebuilt rules for the common orientation-sensitive computations.
//!
//! Each rule targets the first match; use [`RewriteRule::with_occurrence`] for more.

use crate::rule::{OccurrenceSpec, Replacement, RewriteRule, RuleSet};
use gravflip_core::pattern::{Pattern, Predicate};
use gravflip_core::{Opcode, TransformId};

fn substitute_op(name: &str, op: Opcode, transform: TransformId) -> RewriteRule {
    RewriteRule::substitute(name, Pattern::single(name, Predicate::op(op)), transform)
}

pub fn invert_vector_addition() -> RewriteRule {
    substitute_op("vector addition", Opcode::Add, TransformId::VecAdd)
}

pub fn invert_vector_subtraction() -> RewriteRule {
    substitute_op("vector subtraction", Opcode::Subtract, TransformId::VecSub)
}

pub fn swap_min() -> RewriteRule {
    substitute_op("min", Opcode::Min, TransformId::FloatMin)
}

pub fn swap_max() -> RewriteRule {
    substitute_op("max", Opcode::Max, TransformId::FloatMax)
}

pub fn invert_sign() -> RewriteRule {
    substitute_op("sign", Opcode::Sign, TransformId::Sign)
}

/// An addition whose right operand is a freshly loaded `(0, ±1)`. Only the `add` is replaced.
pub fn invert_unit_y_addition() -> RewriteRule {
    let pattern = Pattern::new(
        "unit-y addition",
        vec![Predicate::unit_y(), Predicate::op(Opcode::Add)],
    )
    .with_anchor(1);
    RewriteRule::substitute("unit-y addition", pattern, TransformId::VecAdd)
}

/// Passes every loaded float constant through `NegateFloat`.
pub fn negate_float_constant() -> RewriteRule {
    let pattern = Pattern::single(
        "ldc float",
        Predicate::constant_where("ldc float", |value| value.as_float().is_some()),
    );
    RewriteRule::new(
        "float constant",
        pattern,
        Replacement::Append(TransformId::NegateFloat),
        OccurrenceSpec::First,
    )
}

/// Passes the result of every call to `method` through `transform`.
pub fn invert_call_result(method: &str, transform: TransformId) -> RewriteRule {
    let name = format!("{method} result");
    RewriteRule::new(
        name.clone(),
        Pattern::single(name, Predicate::call_to(method)),
        Replacement::Append(transform),
        OccurrenceSpec::First,
    )
}

/// Every arithmetic rule, each replacing all matches from the start of the body and
/// tolerating bodies that lack the operation.
pub fn gravity_arithmetic(name: &str) -> RuleSet {
    let tolerant = OccurrenceSpec::All { allow_zero: true };
    [
        invert_vector_addition(),
        invert_vector_subtraction(),
        swap_min(),
        swap_max(),
        invert_sign(),
    ]
    .into_iter()
    .fold(RuleSet::new(name), |set, rule| {
        set.with_rule(rule.with_occurrence(tolerant).with_reset())
    })
}
