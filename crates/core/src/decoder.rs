//! Reference decoder for the line-oriented assembly form of a method body.
//!
//! The host's own bytecode decoder is an external collaborator; this text form exists so method
//! bodies can be written by hand, stored next to rule documents and round-tripped in tests.
//!
//! ```text
//! 0000: ldc (0.0, 10.0)
//! 0001: ldc (0.0, 5.0)
//! 0002: add            # vector addition
//! 0003: ret
//! ```

use crate::instruction::{
    BranchCondition, Callee, HostOp, InstrId, Instruction, InstructionStream, Opcode, TransformId,
};
use crate::result::{Error, Result};
use crate::value::Value;
use std::fmt;

/// Parses assembly text into an instruction stream.
pub fn parse_assembly(asm: &str) -> Result<InstructionStream> {
    if asm.trim().is_empty() {
        return Err(Error::ParseError {
            line: 0,
            msg: "empty assembly".into(),
            raw: asm.to_string(),
        });
    }

    let mut instructions = Vec::new();
    for (line_no, raw) in asm.lines().enumerate() {
        let line = raw.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        instructions.push(parse_line(line_no, line, raw)?);
    }

    if instructions.is_empty() {
        return Err(Error::ParseError {
            line: 0,
            msg: "no instructions".into(),
            raw: asm.to_string(),
        });
    }

    InstructionStream::from_instructions(instructions)
}

fn parse_line(line_no: usize, line: &str, raw: &str) -> Result<Instruction> {
    let parse_error = |msg: &str| Error::ParseError {
        line: line_no,
        msg: msg.to_string(),
        raw: raw.to_string(),
    };

    let (id_part, body) = line.split_once(':').ok_or_else(|| parse_error("missing id"))?;
    let id = id_part
        .trim()
        .parse::<u32>()
        .map(InstrId)
        .map_err(|_| parse_error("invalid id"))?;

    let body = body.trim();
    let (mnemonic, operand) = match body.split_once(char::is_whitespace) {
        Some((mnemonic, rest)) => (mnemonic, rest.trim()),
        None => (body, ""),
    };
    if mnemonic.is_empty() {
        return Err(parse_error("missing mnemonic"));
    }

    let no_operand = |instr: Instruction| {
        if operand.is_empty() {
            Ok(instr)
        } else {
            Err(parse_error("unexpected operand"))
        }
    };

    match mnemonic {
        "add" => no_operand(Instruction::simple(id, Opcode::Add)),
        "sub" => no_operand(Instruction::simple(id, Opcode::Subtract)),
        "min" => no_operand(Instruction::simple(id, Opcode::Min)),
        "max" => no_operand(Instruction::simple(id, Opcode::Max)),
        "sign" => no_operand(Instruction::simple(id, Opcode::Sign)),
        "ldc" => {
            let value = operand
                .parse::<Value>()
                .map_err(|_| parse_error("invalid constant"))?;
            Ok(Instruction::load_constant(id, value))
        }
        "br" | "brtrue" | "brfalse" => {
            let condition = match mnemonic {
                "brtrue" => BranchCondition::IfTrue,
                "brfalse" => BranchCondition::IfFalse,
                _ => BranchCondition::Always,
            };
            let target = operand
                .parse::<u32>()
                .map(InstrId)
                .map_err(|_| parse_error("invalid branch target"))?;
            Ok(Instruction::branch(id, condition, target))
        }
        "call" => {
            let mut parts = operand.split_whitespace();
            let name = parts.next().ok_or_else(|| parse_error("missing callee"))?;
            let arity = parts
                .next()
                .ok_or_else(|| parse_error("missing arity"))?
                .parse::<u8>()
                .map_err(|_| parse_error("invalid arity"))?;
            let returns = match parts.next() {
                None => true,
                Some("void") => false,
                Some(_) => return Err(parse_error("unexpected call suffix")),
            };
            Ok(Instruction::call_method(id, name, arity, returns))
        }
        "call.transform" => {
            let transform = operand
                .parse::<TransformId>()
                .map_err(|_| parse_error("unknown transform"))?;
            Ok(Instruction::call_transform(id, transform))
        }
        "ldarg" | "ldloc" | "stloc" => {
            let op = match mnemonic {
                "ldarg" => HostOp::LoadArg,
                "ldloc" => HostOp::LoadLocal,
                _ => HostOp::StoreLocal,
            };
            let slot = operand
                .parse::<u16>()
                .map_err(|_| parse_error("invalid slot"))?;
            Ok(Instruction::host_slot(id, op, slot))
        }
        other => {
            let op = host_op_for(other).ok_or_else(|| parse_error("unknown mnemonic"))?;
            no_operand(Instruction::host(id, op))
        }
    }
}

/// Opcode named by an assembly mnemonic, ignoring any operand.
pub fn opcode_for_mnemonic(mnemonic: &str) -> Option<Opcode> {
    Some(match mnemonic {
        "add" => Opcode::Add,
        "sub" => Opcode::Subtract,
        "min" => Opcode::Min,
        "max" => Opcode::Max,
        "sign" => Opcode::Sign,
        "ldc" => Opcode::LoadConstant,
        "br" | "brtrue" | "brfalse" => Opcode::Branch,
        "call" | "call.transform" => Opcode::Call,
        "ldarg" => Opcode::Other(HostOp::LoadArg),
        "ldloc" => Opcode::Other(HostOp::LoadLocal),
        "stloc" => Opcode::Other(HostOp::StoreLocal),
        other => Opcode::Other(host_op_for(other)?),
    })
}

fn host_op_for(mnemonic: &str) -> Option<HostOp> {
    Some(match mnemonic {
        "dup" => HostOp::Dup,
        "pop" => HostOp::Pop,
        "neg" => HostOp::Negate,
        "clt" => HostOp::CompareLt,
        "cgt" => HostOp::CompareGt,
        "ceq" => HostOp::CompareEq,
        "ret" => HostOp::Return,
        "nop" => HostOp::Nop,
        _ => return None,
    })
}

fn host_mnemonic(op: HostOp) -> &'static str {
    match op {
        HostOp::LoadArg => "ldarg",
        HostOp::LoadLocal => "ldloc",
        HostOp::StoreLocal => "stloc",
        HostOp::Dup => "dup",
        HostOp::Pop => "pop",
        HostOp::Negate => "neg",
        HostOp::CompareLt => "clt",
        HostOp::CompareGt => "cgt",
        HostOp::CompareEq => "ceq",
        HostOp::Return => "ret",
        HostOp::Nop => "nop",
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: ", self.id)?;
        match self.op {
            Opcode::Add => f.write_str("add"),
            Opcode::Subtract => f.write_str("sub"),
            Opcode::Min => f.write_str("min"),
            Opcode::Max => f.write_str("max"),
            Opcode::Sign => f.write_str("sign"),
            Opcode::LoadConstant => match self.constant() {
                Some(value) => write!(f, "ldc {value}"),
                None => f.write_str("ldc ?"),
            },
            Opcode::Branch => {
                let mnemonic = match self.branch_condition() {
                    Some(BranchCondition::IfTrue) => "brtrue",
                    Some(BranchCondition::IfFalse) => "brfalse",
                    _ => "br",
                };
                match self.branch_target() {
                    Some(target) => write!(f, "{mnemonic} {target}"),
                    None => write!(f, "{mnemonic} ?"),
                }
            }
            Opcode::Call => match self.callee() {
                Some(Callee::Method {
                    name,
                    arity,
                    returns,
                }) => {
                    write!(f, "call {name} {arity}")?;
                    if !returns {
                        f.write_str(" void")?;
                    }
                    Ok(())
                }
                Some(Callee::Transform(transform)) => write!(f, "call.transform {transform}"),
                None => f.write_str("call ?"),
            },
            Opcode::Other(op) => {
                f.write_str(host_mnemonic(op))?;
                match self.slot() {
                    Some(slot) if op.takes_slot() => write!(f, " {slot}"),
                    _ => Ok(()),
                }
            }
        }
    }
}
