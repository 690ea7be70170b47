//! Stateful cursor for localized edits on a working instruction stream.
//!
//! The cursor sits *before* the instruction at [`Cursor::index`]. Inserting emits at that point
//! and moves past the new instruction; removing drops instructions starting at that point.
//!
//! Removal never leaves a branch pointing at a removed instruction. Branches aimed at removed
//! instructions are redirected to the instruction the cursor inserted immediately before the
//! removal point, so replacing a referenced computation means inserting first and removing
//! second. Without such an instruction the removal is refused.

use crate::instruction::{
    BranchCondition, Callee, InstrId, Instruction, InstructionStream, Opcode, Operand,
    TransformId,
};
use crate::pattern::{Direction, Pattern, find_next};
use crate::result::{Error, Result};

/// Position tracker with insert/remove operations over a borrowed stream.
pub struct Cursor<'s> {
    stream: &'s mut InstructionStream,
    index: usize,
    last_inserted: Option<InstrId>,
}

impl<'s> Cursor<'s> {
    pub fn new(stream: &'s mut InstructionStream) -> Self {
        Self {
            stream,
            index: 0,
            last_inserted: None,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn stream(&self) -> &InstructionStream {
        self.stream
    }

    /// Instruction right after the cursor.
    pub fn current(&self) -> Option<&Instruction> {
        self.stream.get(self.index)
    }

    pub fn peek(&self, offset: isize) -> Option<&Instruction> {
        let target = self.index.checked_add_signed(offset)?;
        self.stream.get(target)
    }

    /// Moves before the instruction at `index`; `index == len` is the end position.
    pub fn goto(&mut self, index: usize) -> Result<()> {
        if index > self.stream.len() {
            return Err(Error::CursorOutOfBounds {
                index,
                len: self.stream.len(),
            });
        }
        self.index = index;
        self.last_inserted = None;
        Ok(())
    }

    pub fn reset(&mut self) {
        self.index = 0;
        self.last_inserted = None;
    }

    pub fn goto_end(&mut self) {
        self.index = self.stream.len();
        self.last_inserted = None;
    }

    /// Moves before the instruction identified by `label`.
    pub fn branch_to(&mut self, label: InstrId) -> Result<()> {
        let index = self
            .stream
            .position_of(label)
            .ok_or(Error::UnknownInstruction(label))?;
        self.goto(index)
    }

    /// Searches from the current position. On success the cursor moves to the start of the
    /// matched window; on failure it stays where it was.
    pub fn seek(&mut self, pattern: &Pattern, direction: Direction) -> bool {
        match find_next(self.stream.as_slice(), self.index, pattern, direction) {
            Some(index) => {
                tracing::trace!(
                    "cursor: `{}` matched at {} ({:?})",
                    pattern.name(),
                    index,
                    direction
                );
                self.index = index;
                self.last_inserted = None;
                true
            }
            None => false,
        }
    }

    /// Emits a fresh instruction at the cursor and moves past it.
    pub fn insert(&mut self, op: Opcode, operands: Vec<Operand>) -> Result<InstrId> {
        let id = self.stream.fresh_id()?;
        self.stream
            .insert(self.index, Instruction::new(id, op, operands));
        self.index += 1;
        self.last_inserted = Some(id);
        Ok(id)
    }

    /// Emits a call to `transform`.
    ///
    /// The call pops exactly the operands the replaced computation would have consumed and
    /// pushes its result in the same place, so the surrounding code is unaffected.
    pub fn insert_replacement_call(&mut self, transform: TransformId) -> Result<InstrId> {
        self.insert(
            Opcode::Call,
            vec![Operand::Callee(Callee::Transform(transform))],
        )
    }

    /// Emits a branch to an existing instruction.
    pub fn insert_branch(&mut self, condition: BranchCondition, label: InstrId) -> Result<InstrId> {
        if !self.stream.contains(label) {
            return Err(Error::UnknownInstruction(label));
        }
        self.insert(
            Opcode::Branch,
            vec![Operand::Condition(condition), Operand::Target(label)],
        )
    }

    /// Removes `count` instructions after the cursor.
    ///
    /// Nothing is modified when the removal is refused.
    pub fn remove_current(&mut self, count: usize) -> Result<Vec<Instruction>> {
        let end = self.index + count;
        if end > self.stream.len() {
            return Err(Error::CursorOutOfBounds {
                index: end,
                len: self.stream.len(),
            });
        }
        if count == 0 {
            return Ok(Vec::new());
        }

        let removed: Vec<InstrId> = self.stream.as_slice()[self.index..end]
            .iter()
            .map(|instr| instr.id)
            .collect();

        let anchor = self.retarget_anchor();
        let mut retargets = Vec::new();
        for id in removed {
            // branches removed in the same span do not need a new target
            let outside = self
                .stream
                .branches_to(id)
                .into_iter()
                .find(|referrer| !(self.index..end).contains(referrer));
            let Some(referrer) = outside else {
                continue;
            };
            if anchor.is_none() {
                return Err(Error::DanglingBranchTarget {
                    removed: id,
                    branch: self.stream.as_slice()[referrer].id,
                });
            }
            retargets.push(id);
        }

        if let Some(anchor) = anchor {
            for id in retargets {
                let moved = self.stream.retarget(id, anchor);
                tracing::trace!("cursor: retargeted {} branch(es) {} -> {}", moved, id, anchor);
            }
        }

        Ok(self.stream.drain(self.index, count))
    }

    /// The instruction this cursor emitted immediately before its position, if any.
    fn retarget_anchor(&self) -> Option<InstrId> {
        let before = self.index.checked_sub(1)?;
        let candidate = self.stream.get(before)?.id;
        (self.last_inserted == Some(candidate)).then_some(candidate)
    }
}
