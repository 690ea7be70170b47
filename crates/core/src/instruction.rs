//! Instruction model for decoded method bodies.
//!
//! Every instruction carries a stable [`InstrId`]. Branches refer to their destination by that
//! identity rather than by offset, so inserting or removing instructions anywhere in a stream
//! never invalidates an unrelated jump.

use crate::result::{Error, Result};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Stable identity of an instruction inside one stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstrId(pub u32);

impl fmt::Display for InstrId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}", self.0)
    }
}

/// Opcode kinds the rewrite engine distinguishes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Opcode {
    Add,
    Subtract,
    Min,
    Max,
    Sign,
    LoadConstant,
    Branch,
    Call,
    /// Any other host stack operation.
    Other(HostOp),
}

/// Host stack operations that are never rewritten but are needed to execute a body.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HostOp {
    LoadArg,
    LoadLocal,
    StoreLocal,
    Dup,
    Pop,
    Negate,
    CompareLt,
    CompareGt,
    CompareEq,
    Return,
    Nop,
}

impl HostOp {
    /// True for operations that take a slot index operand.
    pub fn takes_slot(self) -> bool {
        matches!(self, HostOp::LoadArg | HostOp::LoadLocal | HostOp::StoreLocal)
    }
}

/// When a branch is taken.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BranchCondition {
    Always,
    IfTrue,
    IfFalse,
}

/// Invert-aware transforms that rewritten bodies call into.
///
/// The identifiers live here so instruction operands can name them; their implementations
/// belong to the transform crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TransformId {
    VecAdd,
    VecSub,
    FloatMin,
    FloatMax,
    Sign,
    NegateY,
    NegateFloat,
    NegateInt,
}

impl TransformId {
    pub const ALL: [TransformId; 8] = [
        TransformId::VecAdd,
        TransformId::VecSub,
        TransformId::FloatMin,
        TransformId::FloatMax,
        TransformId::Sign,
        TransformId::NegateY,
        TransformId::NegateFloat,
        TransformId::NegateInt,
    ];

    /// Number of stack operands the transform consumes.
    pub fn arity(self) -> usize {
        match self {
            TransformId::VecAdd
            | TransformId::VecSub
            | TransformId::FloatMin
            | TransformId::FloatMax => 2,
            TransformId::Sign
            | TransformId::NegateY
            | TransformId::NegateFloat
            | TransformId::NegateInt => 1,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TransformId::VecAdd => "VecAdd",
            TransformId::VecSub => "VecSub",
            TransformId::FloatMin => "FloatMin",
            TransformId::FloatMax => "FloatMax",
            TransformId::Sign => "Sign",
            TransformId::NegateY => "NegateY",
            TransformId::NegateFloat => "NegateFloat",
            TransformId::NegateInt => "NegateInt",
        }
    }
}

impl fmt::Display for TransformId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TransformId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        TransformId::ALL
            .into_iter()
            .find(|id| id.name() == s)
            .ok_or_else(|| Error::InvalidValue(format!("unknown transform `{s}`")))
    }
}

/// Target of a call instruction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Callee {
    /// A method of the host program, resolved by name at run time.
    Method {
        name: String,
        arity: u8,
        returns: bool,
    },
    /// An injected invert-aware replacement.
    Transform(TransformId),
}

/// Typed or symbolic instruction operand.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Operand {
    Value(Value),
    Target(InstrId),
    Condition(BranchCondition),
    Callee(Callee),
    Slot(u16),
}

/// Single decoded instruction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    /// Stable identity, usable as a branch target
    pub id: InstrId,
    /// Opcode kind
    pub op: Opcode,
    /// Operands in declaration order
    pub operands: Vec<Operand>,
}

impl Instruction {
    pub fn new(id: InstrId, op: Opcode, operands: Vec<Operand>) -> Self {
        Self { id, op, operands }
    }

    /// Opcode without operands (`Add`, `Sign`, `Other(Dup)`, ...).
    pub fn simple(id: InstrId, op: Opcode) -> Self {
        Self::new(id, op, Vec::new())
    }

    pub fn load_constant(id: InstrId, value: Value) -> Self {
        Self::new(id, Opcode::LoadConstant, vec![Operand::Value(value)])
    }

    pub fn branch(id: InstrId, condition: BranchCondition, target: InstrId) -> Self {
        Self::new(
            id,
            Opcode::Branch,
            vec![Operand::Condition(condition), Operand::Target(target)],
        )
    }

    pub fn call_method(id: InstrId, name: impl Into<String>, arity: u8, returns: bool) -> Self {
        Self::new(
            id,
            Opcode::Call,
            vec![Operand::Callee(Callee::Method {
                name: name.into(),
                arity,
                returns,
            })],
        )
    }

    pub fn call_transform(id: InstrId, transform: TransformId) -> Self {
        Self::new(
            id,
            Opcode::Call,
            vec![Operand::Callee(Callee::Transform(transform))],
        )
    }

    pub fn host(id: InstrId, op: HostOp) -> Self {
        Self::simple(id, Opcode::Other(op))
    }

    pub fn host_slot(id: InstrId, op: HostOp, slot: u16) -> Self {
        Self::new(id, Opcode::Other(op), vec![Operand::Slot(slot)])
    }

    #[inline]
    pub fn is_branch(&self) -> bool {
        self.op == Opcode::Branch
    }

    /// Destination of a branch, if this is one.
    pub fn branch_target(&self) -> Option<InstrId> {
        if !self.is_branch() {
            return None;
        }
        self.operands.iter().find_map(|operand| match operand {
            Operand::Target(id) => Some(*id),
            _ => None,
        })
    }

    /// Branch condition; unconditional when the operand is absent.
    pub fn branch_condition(&self) -> Option<BranchCondition> {
        if !self.is_branch() {
            return None;
        }
        Some(
            self.operands
                .iter()
                .find_map(|operand| match operand {
                    Operand::Condition(condition) => Some(*condition),
                    _ => None,
                })
                .unwrap_or(BranchCondition::Always),
        )
    }

    /// The loaded constant of a `LoadConstant`.
    pub fn constant(&self) -> Option<&Value> {
        if self.op != Opcode::LoadConstant {
            return None;
        }
        self.operands.iter().find_map(|operand| match operand {
            Operand::Value(value) => Some(value),
            _ => None,
        })
    }

    pub fn callee(&self) -> Option<&Callee> {
        if self.op != Opcode::Call {
            return None;
        }
        self.operands.iter().find_map(|operand| match operand {
            Operand::Callee(callee) => Some(callee),
            _ => None,
        })
    }

    pub fn slot(&self) -> Option<u16> {
        self.operands.iter().find_map(|operand| match operand {
            Operand::Slot(slot) => Some(*slot),
            _ => None,
        })
    }

    /// Redirects a branch to `target`, returning the rebuilt instruction.
    ///
    /// The identity is kept; the receiver itself is not modified.
    pub(crate) fn retargeted(&self, target: InstrId) -> Self {
        let operands = self
            .operands
            .iter()
            .map(|operand| match operand {
                Operand::Target(_) => Operand::Target(target),
                other => other.clone(),
            })
            .collect();
        Self::new(self.id, self.op, operands)
    }
}

/// Ordered instructions of one method body.
#[derive(Clone, Debug, Default)]
pub struct InstructionStream {
    instructions: Vec<Instruction>,
    // one past the highest id seen; wider than `InstrId` so `u32::MAX` can be recorded
    next_id: u64,
}

impl PartialEq for InstructionStream {
    /// Two streams are equal when their instructions are; the id allocator is not compared.
    fn eq(&self, other: &Self) -> bool {
        self.instructions == other.instructions
    }
}

impl InstructionStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps already decoded instructions, rejecting duplicate identities.
    pub fn from_instructions(instructions: Vec<Instruction>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(instructions.len());
        for instr in &instructions {
            if !seen.insert(instr.id) {
                return Err(Error::DuplicateInstructionId(instr.id));
            }
        }
        let next_id = instructions
            .iter()
            .map(|instr| u64::from(instr.id.0) + 1)
            .max()
            .unwrap_or(0);
        Ok(Self {
            instructions,
            next_id,
        })
    }

    /// Allocates an identity that no instruction of this stream has used.
    pub fn fresh_id(&mut self) -> Result<InstrId> {
        let id = u32::try_from(self.next_id).map_err(|_| Error::IdSpaceExhausted)?;
        self.next_id += 1;
        Ok(InstrId(id))
    }

    /// Appends a new instruction and returns its identity.
    pub fn push(&mut self, op: Opcode, operands: Vec<Operand>) -> Result<InstrId> {
        let id = self.fresh_id()?;
        self.instructions.push(Instruction::new(id, op, operands));
        Ok(id)
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Instruction> {
        self.instructions.get(index)
    }

    pub fn as_slice(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Instruction> {
        self.instructions.iter()
    }

    pub fn position_of(&self, id: InstrId) -> Option<usize> {
        self.instructions.iter().position(|instr| instr.id == id)
    }

    pub fn contains(&self, id: InstrId) -> bool {
        self.position_of(id).is_some()
    }

    /// Indices of every branch whose destination is `id`.
    pub fn branches_to(&self, id: InstrId) -> Vec<usize> {
        self.instructions
            .iter()
            .enumerate()
            .filter(|(_, instr)| instr.branch_target() == Some(id))
            .map(|(index, _)| index)
            .collect()
    }

    pub(crate) fn insert(&mut self, index: usize, instr: Instruction) {
        self.next_id = self.next_id.max(u64::from(instr.id.0) + 1);
        self.instructions.insert(index, instr);
    }

    pub(crate) fn drain(&mut self, index: usize, count: usize) -> Vec<Instruction> {
        self.instructions.drain(index..index + count).collect()
    }

    /// Points every branch aimed at `from` to `to` instead.
    pub(crate) fn retarget(&mut self, from: InstrId, to: InstrId) -> usize {
        let mut changed = 0;
        for slot in self.instructions.iter_mut() {
            if slot.branch_target() == Some(from) {
                *slot = slot.retargeted(to);
                changed += 1;
            }
        }
        changed
    }
}

impl<'a> IntoIterator for &'a InstructionStream {
    type Item = &'a Instruction;
    type IntoIter = std::slice::Iter<'a, Instruction>;

    fn into_iter(self) -> Self::IntoIter {
        self.instructions.iter()
    }
}
