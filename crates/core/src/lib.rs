pub mod cursor;
pub mod decoder;
pub mod encoder;
pub mod instruction;
pub mod pattern;
pub mod result;
pub mod validator;
pub mod value;

pub use instruction::{
    BranchCondition, Callee, HostOp, InstrId, Instruction, InstructionStream, Opcode, Operand,
    TransformId,
};
pub use result::{Error, Result};
pub use value::{Value, Vec2};

/// Returns true for the arithmetic and comparison opcodes the rewrite engine targets.
#[inline]
pub fn is_rewritable_opcode(opcode: Opcode) -> bool {
    matches!(
        opcode,
        Opcode::Add | Opcode::Subtract | Opcode::Min | Opcode::Max | Opcode::Sign
    )
}

/// Returns true if the instruction ends execution of the body.
#[inline]
pub fn is_terminal(instr: &Instruction) -> bool {
    instr.op == Opcode::Other(HostOp::Return)
}
