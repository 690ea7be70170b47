//! Core results and error types

use crate::instruction::InstrId;
use thiserror::Error;

/// Core error type encompassing all core module errors.
#[derive(Debug, Error, PartialEq)]
pub enum Error {
    /// The cursor was moved outside of the instruction stream.
    #[error("cursor index {index} out of bounds for stream of length {len}")]
    CursorOutOfBounds {
        /// Requested index.
        index: usize,
        /// Stream length at the time of the request.
        len: usize,
    },

    /// A removal would leave a branch pointing at an instruction that no longer exists.
    #[error("removing {removed} would leave branch {branch} without a target")]
    DanglingBranchTarget {
        /// Identity of the instruction about to be removed.
        removed: InstrId,
        /// Identity of the branch still referencing it.
        branch: InstrId,
    },

    /// Two instructions in one stream share an identity.
    #[error("duplicate instruction id {0}")]
    DuplicateInstructionId(InstrId),

    /// A branch targets an identity that is not part of the stream.
    #[error("branch {branch} targets unknown instruction {target}")]
    InvalidBranchTarget {
        /// The branch instruction.
        branch: InstrId,
        /// The missing target.
        target: InstrId,
    },

    /// Every instruction id has been handed out.
    #[error("instruction id space exhausted")]
    IdSpaceExhausted,

    /// Operand literal could not be parsed.
    #[error("invalid value literal: {0}")]
    InvalidValue(String),

    /// Instruction is missing an operand its opcode requires.
    #[error("malformed instruction {id}: {msg}")]
    MalformedInstruction {
        /// Offending instruction.
        id: InstrId,
        /// What is wrong with it.
        msg: String,
    },

    /// Failed to parse assembly at the specified line.
    #[error("assembly parse error at line {line}: {msg} ⇒ `{raw}`")]
    ParseError {
        /// The line number where parsing failed.
        line: usize,
        /// Description of the parsing error.
        msg: String,
        /// The raw content that failed to parse.
        raw: String,
    },

    /// A label does not resolve to any instruction in the stream.
    #[error("unknown instruction {0}")]
    UnknownInstruction(InstrId),
}

/// Core result type
pub type Result<T> = std::result::Result<T, Error>;
