//! Validate that every branch of an instruction stream resolves to an instruction of that
//! stream.
//!
//! Rewrites only ever insert and remove through the cursor, which keeps branch targets intact;
//! this check runs after a rule set has been applied so a broken body is never handed to the
//! host loader.

use std::collections::HashSet;

use crate::{
    instruction::InstructionStream,
    result::{Error, Result},
};

/// Checks identity uniqueness and branch resolution.
///
/// Every invalid branch is logged; the first one is returned as the error.
pub fn validate_branch_targets(stream: &InstructionStream) -> Result<()> {
    let mut ids = HashSet::with_capacity(stream.len());
    for instr in stream {
        if !ids.insert(instr.id) {
            return Err(Error::DuplicateInstructionId(instr.id));
        }
    }

    let mut first_error = None;
    let mut invalid = 0usize;
    for instr in stream.iter().filter(|instr| instr.is_branch()) {
        let Some(target) = instr.branch_target() else {
            invalid += 1;
            tracing::debug!("branch {} has no target operand", instr.id);
            first_error.get_or_insert(Error::MalformedInstruction {
                id: instr.id,
                msg: "branch without target".into(),
            });
            continue;
        };
        if !ids.contains(&target) {
            invalid += 1;
            tracing::debug!("branch {} targets missing instruction {}", instr.id, target);
            first_error.get_or_insert(Error::InvalidBranchTarget {
                branch: instr.id,
                target,
            });
        }
    }

    match first_error {
        Some(err) => {
            tracing::debug!("found {} invalid branch(es)", invalid);
            Err(err)
        }
        None => Ok(()),
    }
}
