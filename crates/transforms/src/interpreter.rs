//! Reference stack interpreter for instruction streams.
//!
//! Executes a body the way the host would, with injected transform calls dispatched through
//! [`values::invoke`] against a live [`GravityQuery`]. Calls to host methods go through
//! [`HostCalls`].

use crate::values::{self, signum};
use crate::{Error, HookConfig, Result};
use gravflip_core::{
    is_terminal, BranchCondition, Callee, HostOp, InstrId, Instruction, InstructionStream, Opcode,
    Value,
};
use gravflip_gravity::GravityQuery;
use std::collections::BTreeMap;
use tracing::trace;

/// Resolves calls to host methods during evaluation.
pub trait HostCalls {
    fn call(&mut self, method: &str, args: &[Value]) -> Result<Option<Value>>;
}

/// Rejects every host call.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoHostCalls;

impl HostCalls for NoHostCalls {
    fn call(&mut self, method: &str, _args: &[Value]) -> Result<Option<Value>> {
        Err(Error::MethodNotFound(method.to_string()))
    }
}

pub struct Interpreter<'g> {
    gravity: &'g dyn GravityQuery,
    max_steps: usize,
}

impl<'g> Interpreter<'g> {
    pub fn new(gravity: &'g dyn GravityQuery) -> Self {
        Self::with_config(gravity, &HookConfig::default())
    }

    pub fn with_config(gravity: &'g dyn GravityQuery, config: &HookConfig) -> Self {
        Self {
            gravity,
            max_steps: config.max_eval_steps,
        }
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Runs `stream` with `args` and returns the value on top of the stack at `ret` or at the
    /// end of the body.
    pub fn run(
        &self,
        stream: &InstructionStream,
        args: &[Value],
        host: &mut dyn HostCalls,
    ) -> Result<Option<Value>> {
        let mut frame = Frame::default();
        let mut pc = 0usize;
        let mut steps = 0usize;

        while let Some(instr) = stream.get(pc) {
            steps += 1;
            if steps > self.max_steps {
                return Err(Error::StepLimitExceeded(self.max_steps));
            }
            if is_terminal(instr) {
                return Ok(frame.stack.pop());
            }
            trace!("{:>5} {} {:?}", steps, instr, frame.stack);

            pc = match self.step(instr, &mut frame, stream, args, host)? {
                Some(target) => target,
                None => pc + 1,
            };
        }
        Ok(frame.stack.pop())
    }

    /// Executes one instruction; returns the index to jump to for taken branches.
    fn step(
        &self,
        instr: &Instruction,
        frame: &mut Frame,
        stream: &InstructionStream,
        args: &[Value],
        host: &mut dyn HostCalls,
    ) -> Result<Option<usize>> {
        let at = instr.id;
        match instr.op {
            Opcode::Add | Opcode::Subtract | Opcode::Min | Opcode::Max => {
                let (a, b) = frame.pop2(at)?;
                frame.stack.push(binary(instr.op, a, b, at)?);
            }
            Opcode::Sign => {
                let value = match frame.pop(at)? {
                    Value::Float(f) => Value::Float(signum(f)),
                    Value::Int(i) => Value::Int(i.signum()),
                    other => return Err(eval_error(at, format!("sign of {}", other.kind()))),
                };
                frame.stack.push(value);
            }
            Opcode::LoadConstant => {
                let value = instr
                    .constant()
                    .ok_or_else(|| eval_error(at, "ldc without constant"))?;
                frame.stack.push(*value);
            }
            Opcode::Branch => {
                let taken = match instr.branch_condition().unwrap_or(BranchCondition::Always) {
                    BranchCondition::Always => true,
                    BranchCondition::IfTrue => truthy(frame.pop(at)?, at)?,
                    BranchCondition::IfFalse => !truthy(frame.pop(at)?, at)?,
                };
                if taken {
                    let target = instr
                        .branch_target()
                        .ok_or_else(|| eval_error(at, "branch without target"))?;
                    let index = stream
                        .position_of(target)
                        .ok_or_else(|| eval_error(at, format!("unknown branch target {target}")))?;
                    return Ok(Some(index));
                }
            }
            Opcode::Call => match instr.callee() {
                Some(Callee::Method {
                    name,
                    arity,
                    returns,
                }) => {
                    let call_args = frame.pop_n(usize::from(*arity), at)?;
                    let result = host.call(name, &call_args)?;
                    if *returns {
                        let value = result
                            .ok_or_else(|| eval_error(at, format!("{name} returned nothing")))?;
                        frame.stack.push(value);
                    }
                }
                Some(Callee::Transform(transform)) => {
                    let call_args = frame.pop_n(transform.arity(), at)?;
                    frame
                        .stack
                        .push(values::invoke(*transform, self.gravity, &call_args)?);
                }
                None => return Err(eval_error(at, "call without callee")),
            },
            Opcode::Other(op) => self.host_op(op, instr, frame, args)?,
        }
        Ok(None)
    }

    fn host_op(
        &self,
        op: HostOp,
        instr: &Instruction,
        frame: &mut Frame,
        args: &[Value],
    ) -> Result<()> {
        let at = instr.id;
        let slot = || {
            instr
                .slot()
                .ok_or_else(|| eval_error(at, "missing slot operand"))
        };

        match op {
            HostOp::LoadArg => {
                let index = slot()?;
                let value = args
                    .get(usize::from(index))
                    .ok_or_else(|| eval_error(at, format!("no argument {index}")))?;
                frame.stack.push(*value);
            }
            HostOp::LoadLocal => {
                let index = slot()?;
                let value = frame
                    .locals
                    .get(&index)
                    .ok_or_else(|| eval_error(at, format!("local {index} is unset")))?;
                frame.stack.push(*value);
            }
            HostOp::StoreLocal => {
                let index = slot()?;
                let value = frame.pop(at)?;
                frame.locals.insert(index, value);
            }
            HostOp::Dup => {
                let top = *frame
                    .stack
                    .last()
                    .ok_or_else(|| eval_error(at, "stack underflow"))?;
                frame.stack.push(top);
            }
            HostOp::Pop => {
                frame.pop(at)?;
            }
            HostOp::Negate => {
                let value = match frame.pop(at)? {
                    Value::Int(i) => Value::Int(i.wrapping_neg()),
                    Value::Float(f) => Value::Float(-f),
                    Value::Vector(v) => Value::Vector(-v),
                    Value::Bool(_) => return Err(eval_error(at, "cannot negate bool")),
                };
                frame.stack.push(value);
            }
            HostOp::CompareLt | HostOp::CompareGt => {
                let (a, b) = frame.pop2(at)?;
                let (lt, gt) = match (a, b) {
                    (Value::Int(a), Value::Int(b)) => (a < b, a > b),
                    (Value::Float(a), Value::Float(b)) => (a < b, a > b),
                    (a, b) => {
                        return Err(eval_error(
                            at,
                            format!("cannot compare {} and {}", a.kind(), b.kind()),
                        ))
                    }
                };
                let result = if op == HostOp::CompareLt { lt } else { gt };
                frame.stack.push(Value::Bool(result));
            }
            HostOp::CompareEq => {
                let (a, b) = frame.pop2(at)?;
                frame.stack.push(Value::Bool(a == b));
            }
            HostOp::Nop | HostOp::Return => {}
        }
        Ok(())
    }
}

#[derive(Default)]
struct Frame {
    stack: Vec<Value>,
    locals: BTreeMap<u16, Value>,
}

impl Frame {
    fn pop(&mut self, at: InstrId) -> Result<Value> {
        self.stack
            .pop()
            .ok_or_else(|| eval_error(at, "stack underflow"))
    }

    /// Pops the right operand, then the left.
    fn pop2(&mut self, at: InstrId) -> Result<(Value, Value)> {
        let b = self.pop(at)?;
        let a = self.pop(at)?;
        Ok((a, b))
    }

    /// Pops `n` values, returned in push order.
    fn pop_n(&mut self, n: usize, at: InstrId) -> Result<Vec<Value>> {
        if self.stack.len() < n {
            return Err(eval_error(at, "stack underflow"));
        }
        Ok(self.stack.split_off(self.stack.len() - n))
    }
}

fn binary(op: Opcode, a: Value, b: Value, at: InstrId) -> Result<Value> {
    let value = match (op, a, b) {
        (Opcode::Add, Value::Int(a), Value::Int(b)) => Value::Int(a.wrapping_add(b)),
        (Opcode::Add, Value::Float(a), Value::Float(b)) => Value::Float(a + b),
        (Opcode::Add, Value::Vector(a), Value::Vector(b)) => Value::Vector(a + b),
        (Opcode::Subtract, Value::Int(a), Value::Int(b)) => Value::Int(a.wrapping_sub(b)),
        (Opcode::Subtract, Value::Float(a), Value::Float(b)) => Value::Float(a - b),
        (Opcode::Subtract, Value::Vector(a), Value::Vector(b)) => Value::Vector(a - b),
        (Opcode::Min, Value::Int(a), Value::Int(b)) => Value::Int(a.min(b)),
        (Opcode::Min, Value::Float(a), Value::Float(b)) => Value::Float(a.min(b)),
        (Opcode::Max, Value::Int(a), Value::Int(b)) => Value::Int(a.max(b)),
        (Opcode::Max, Value::Float(a), Value::Float(b)) => Value::Float(a.max(b)),
        (op, a, b) => {
            return Err(eval_error(
                at,
                format!("{:?} on {} and {}", op, a.kind(), b.kind()),
            ))
        }
    };
    Ok(value)
}

fn truthy(value: Value, at: InstrId) -> Result<bool> {
    match value {
        Value::Bool(b) => Ok(b),
        Value::Int(i) => Ok(i != 0),
        other => Err(eval_error(at, format!("{} is not a condition", other.kind()))),
    }
}

fn eval_error(at: InstrId, msg: impl Into<String>) -> Error {
    Error::Evaluation {
        at,
        msg: msg.into(),
    }
}
