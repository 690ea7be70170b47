use gravflip_core::decoder::parse_assembly;
use gravflip_core::encoder::render_assembly;
use gravflip_core::validator::validate_branch_targets;
use gravflip_core::{Error, InstrId, Instruction, InstructionStream, Opcode};
use gravflip_tests::body;

const JUMP: &str = "
# Player::Jump
0000: ldarg 0              # velocity
0001: ldc (0.0, 1.0)
0002: ldarg 1              # strength
0003: call Vector2::Scale 2
0004: add
0005: dup
0006: call Player::SetVelocity 1 void
0007: brtrue 0009
0008: nop
0009: ret
";

#[test]
fn render_is_canonical() {
    let stream = body(JUMP);
    let rendered = render_assembly(&stream);
    assert!(rendered.starts_with("0000: ldarg 0\n"));
    assert!(rendered.contains("0003: call Vector2::Scale 2\n"));
    assert!(rendered.contains("0006: call Player::SetVelocity 1 void\n"));
    assert_eq!(render_assembly(&body(&rendered)), rendered);
}

#[test]
fn decoded_bodies_validate() {
    let stream = body(JUMP);
    assert_eq!(stream.len(), 10);
    validate_branch_targets(&stream).unwrap();
    assert_eq!(stream.branches_to(InstrId(9)), vec![7]);
}

#[test]
fn dangling_branch_is_reported() {
    let stream = body("0000: br 0007\n0001: ret\n");
    assert_eq!(
        validate_branch_targets(&stream).unwrap_err(),
        Error::InvalidBranchTarget {
            branch: InstrId(0),
            target: InstrId(7),
        }
    );
}

#[test]
fn fresh_ids_never_collide() {
    let mut stream = body("0003: nop\n0010: ret\n");
    let id = stream.push(Opcode::Add, Vec::new()).unwrap();
    assert_eq!(id, InstrId(11));
    assert!(InstructionStream::from_instructions(vec![
        Instruction::simple(InstrId(1), Opcode::Add),
        Instruction::simple(InstrId(1), Opcode::Add),
    ])
    .is_err());
}

#[test]
fn highest_possible_id_parses_but_allocates_nothing() {
    let mut stream = parse_assembly("4294967295: nop\n").unwrap();
    assert_eq!(stream.get(0).unwrap().id, InstrId(u32::MAX));
    assert_eq!(stream.push(Opcode::Add, Vec::new()), Err(Error::IdSpaceExhausted));
}

#[test]
fn parse_errors_carry_the_line() {
    match parse_assembly("0000: nop\n0001: ldc nonsense\n") {
        Err(Error::ParseError { line, .. }) => assert_eq!(line, 1),
        other => panic!("expected parse error, got {other:?}"),
    }
}
