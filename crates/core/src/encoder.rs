//! Renders instruction streams back into the assembly form accepted by
//! [`parse_assembly`](crate::decoder::parse_assembly).

use crate::instruction::InstructionStream;
use std::fmt::Write;

/// Renders one instruction per line.
pub fn render_assembly(stream: &InstructionStream) -> String {
    let mut out = String::with_capacity(stream.len() * 16);
    for instr in stream {
        // writing into a String cannot fail
        let _ = writeln!(out, "{instr}");
    }
    out
}
