//! Predicate-based search over instruction streams.
//!
//! A [`Pattern`] is an ordered list of per-instruction [`Predicate`]s evaluated as a sliding
//! window. A match is reported as the index of the first instruction of the window. Searching
//! never mutates the stream, and a failed search is an ordinary `None`.

use crate::instruction::{Callee, HostOp, Instruction, Opcode, TransformId};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Scan order of a search.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    Forward,
    Backward,
}

/// Read-only view of one candidate position with lookahead in both directions.
#[derive(Clone, Copy)]
pub struct MatchContext<'a> {
    instructions: &'a [Instruction],
    index: usize,
}

impl<'a> MatchContext<'a> {
    /// Returns `None` when `index` is outside `instructions`.
    pub fn new(instructions: &'a [Instruction], index: usize) -> Option<Self> {
        (index < instructions.len()).then_some(Self {
            instructions,
            index,
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn instr(&self) -> &'a Instruction {
        &self.instructions[self.index]
    }

    /// Instruction `offset` positions away, without moving.
    pub fn peek(&self, offset: isize) -> Option<&'a Instruction> {
        let target = self.index.checked_add_signed(offset)?;
        self.instructions.get(target)
    }

    pub fn prev(&self) -> Option<&'a Instruction> {
        self.peek(-1)
    }

    pub fn next(&self) -> Option<&'a Instruction> {
        self.peek(1)
    }

    fn shifted(&self, offset: isize) -> Option<Self> {
        let target = self.index.checked_add_signed(offset)?;
        Self::new(self.instructions, target)
    }
}

type PredicateFn = dyn Fn(&MatchContext<'_>) -> bool + Send + Sync;

/// Named boolean test over one instruction and its neighbours.
#[derive(Clone)]
pub struct Predicate {
    name: Arc<str>,
    test: Arc<PredicateFn>,
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Predicate").field(&self.name).finish()
    }
}

impl Predicate {
    pub fn new<F>(name: impl Into<String>, test: F) -> Self
    where
        F: Fn(&MatchContext<'_>) -> bool + Send + Sync + 'static,
    {
        let name: String = name.into();
        Self {
            name: Arc::from(name),
            test: Arc::new(test),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn matches(&self, ctx: &MatchContext<'_>) -> bool {
        (self.test)(ctx)
    }

    pub fn any() -> Self {
        Self::new("any", |_| true)
    }

    pub fn op(opcode: Opcode) -> Self {
        Self::new(format!("{opcode:?}"), move |ctx| ctx.instr().op == opcode)
    }

    pub fn host(op: HostOp) -> Self {
        Self::op(Opcode::Other(op))
    }

    pub fn branch() -> Self {
        Self::new("branch", |ctx| ctx.instr().is_branch())
    }

    /// Call to a host method with this exact name.
    pub fn call_to(name: impl Into<String>) -> Self {
        let name: String = name.into();
        Self::new(format!("call {name}"), move |ctx| {
            matches!(ctx.instr().callee(), Some(Callee::Method { name: callee, .. }) if *callee == name)
        })
    }

    /// Call to an already injected transform.
    pub fn call_transform(transform: TransformId) -> Self {
        Self::new(format!("call.transform {transform}"), move |ctx| {
            ctx.instr().callee() == Some(&Callee::Transform(transform))
        })
    }

    /// Load of exactly `value`.
    pub fn constant(value: Value) -> Self {
        Self::new(format!("ldc {value}"), move |ctx| {
            ctx.instr().constant() == Some(&value)
        })
    }

    /// Load of any constant accepted by `test`.
    pub fn constant_where<F>(name: impl Into<String>, test: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Self::new(name, move |ctx| ctx.instr().constant().is_some_and(&test))
    }

    /// Load of `(0, 1)` or `(0, -1)`.
    pub fn unit_y() -> Self {
        Self::constant_where("ldc unit-y", |value| {
            value.as_vector().is_some_and(|v| v.is_unit_y())
        })
    }

    pub fn and(self, other: Predicate) -> Self {
        let name = format!("({} & {})", self.name, other.name);
        Self::new(name, move |ctx| self.matches(ctx) && other.matches(ctx))
    }

    pub fn or(self, other: Predicate) -> Self {
        let name = format!("({} | {})", self.name, other.name);
        Self::new(name, move |ctx| self.matches(ctx) || other.matches(ctx))
    }

    pub fn not(self) -> Self {
        let name = format!("!{}", self.name);
        Self::new(name, move |ctx| !self.matches(ctx))
    }

    /// Also requires the successor to satisfy `next`.
    pub fn followed_by(self, next: Predicate) -> Self {
        let name = format!("{} >> {}", self.name, next.name);
        Self::new(name, move |ctx| {
            self.matches(ctx) && ctx.shifted(1).is_some_and(|after| next.matches(&after))
        })
    }

    /// Also requires the predecessor to satisfy `prev`.
    pub fn preceded_by(self, prev: Predicate) -> Self {
        let name = format!("{} << {}", self.name, prev.name);
        Self::new(name, move |ctx| {
            self.matches(ctx) && ctx.shifted(-1).is_some_and(|before| prev.matches(&before))
        })
    }
}

/// Ordered predicates plus the span a rewrite acts on.
///
/// `anchor` is the offset inside the window where a rewrite happens and `consume` the number of
/// instructions a substitution removes from there.
#[derive(Clone, Debug)]
pub struct Pattern {
    name: String,
    predicates: Vec<Predicate>,
    direction: Direction,
    anchor: usize,
    consume: usize,
}

impl Pattern {
    /// Window over `predicates`, anchored at its first instruction and consuming all of it.
    pub fn new(name: impl Into<String>, predicates: Vec<Predicate>) -> Self {
        let consume = predicates.len();
        Self {
            name: name.into(),
            predicates,
            direction: Direction::Forward,
            anchor: 0,
            consume,
        }
    }

    pub fn single(name: impl Into<String>, predicate: Predicate) -> Self {
        Self::new(name, vec![predicate])
    }

    /// Concatenates two windows; the anchor and consume span of `self` are kept.
    pub fn then(mut self, other: Pattern) -> Self {
        self.name = format!("{} + {}", self.name, other.name);
        self.predicates.extend(other.predicates);
        self
    }

    pub fn with_anchor(mut self, anchor: usize) -> Self {
        let width = self.predicates.len();
        self.anchor = anchor.min(width.saturating_sub(1));
        self.consume = self.consume.min(width.saturating_sub(self.anchor));
        self
    }

    /// Non-empty windows consume at least the anchor instruction.
    pub fn with_consume(mut self, consume: usize) -> Self {
        self.consume = consume
            .max(1)
            .min(self.predicates.len().saturating_sub(self.anchor));
        self
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn anchor(&self) -> usize {
        self.anchor
    }

    pub fn consume(&self) -> usize {
        self.consume
    }

    /// True when the window starting at `index` satisfies every predicate.
    pub fn matches_at(&self, instructions: &[Instruction], index: usize) -> bool {
        if self.predicates.is_empty() || index + self.predicates.len() > instructions.len() {
            return false;
        }
        self.predicates
            .iter()
            .enumerate()
            .all(|(offset, predicate)| {
                MatchContext::new(instructions, index + offset)
                    .is_some_and(|ctx| predicate.matches(&ctx))
            })
    }
}

/// Finds the next window matching `pattern`, starting at `from` and scanning in `direction`.
///
/// Backward search visits window starts `from, from - 1, ..., 0`; windows are still read
/// front to back, so both directions agree on what a match is.
pub fn find_next(
    instructions: &[Instruction],
    from: usize,
    pattern: &Pattern,
    direction: Direction,
) -> Option<usize> {
    let width = pattern.len();
    if width == 0 || instructions.len() < width {
        return None;
    }
    let last_start = instructions.len() - width;

    match direction {
        Direction::Forward => {
            (from..=last_start).find(|&index| pattern.matches_at(instructions, index))
        }
        Direction::Backward => (0..=from.min(last_start))
            .rev()
            .find(|&index| pattern.matches_at(instructions, index)),
    }
}

/// All non-overlapping matches, front to back.
pub fn find_all(instructions: &[Instruction], pattern: &Pattern) -> Vec<usize> {
    let mut found = Vec::new();
    let mut from = 0;
    while let Some(index) = find_next(instructions, from, pattern, Direction::Forward) {
        found.push(index);
        from = index + pattern.len();
    }
    found
}

pub fn count_matches(instructions: &[Instruction], pattern: &Pattern) -> usize {
    find_all(instructions, pattern).len()
}
