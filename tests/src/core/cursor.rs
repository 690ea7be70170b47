use gravflip_core::cursor::Cursor;
use gravflip_core::pattern::{Direction, Pattern, Predicate};
use gravflip_core::validator::validate_branch_targets;
use gravflip_core::{Callee, Error, InstrId, Opcode, TransformId};
use gravflip_tests::body;

/// Two branches land on the `min`; one of them loops.
const CLAMP: &str = "
0000: ldarg 0
0001: ldarg 1
0002: brtrue 0005
0003: ldarg 2
0004: br 0005
0005: min
0006: dup
0007: brfalse 0005
0008: ret
";

fn min_pattern() -> Pattern {
    Pattern::single("min", Predicate::op(Opcode::Min))
}

#[test]
fn every_referrer_follows_the_replacement() {
    let mut stream = body(CLAMP);
    let call = {
        let mut cursor = Cursor::new(&mut stream);
        assert!(cursor.seek(&min_pattern(), Direction::Forward));
        let call = cursor.insert_replacement_call(TransformId::FloatMin).unwrap();
        let removed = cursor.remove_current(1).unwrap();
        assert_eq!(removed[0].op, Opcode::Min);
        call
    };

    validate_branch_targets(&stream).unwrap();
    assert!(stream.branches_to(InstrId(5)).is_empty());
    assert_eq!(stream.branches_to(call), vec![2, 4, 7]);
    assert_eq!(stream.len(), 9);
}

#[test]
fn unrelated_branches_survive_nearby_edits() {
    let mut stream = body(CLAMP);
    {
        let mut cursor = Cursor::new(&mut stream);
        cursor.goto(3).unwrap();
        cursor.insert(Opcode::Sign, Vec::new()).unwrap();
        cursor.insert(Opcode::Sign, Vec::new()).unwrap();
        cursor.goto(0).unwrap();
        cursor.remove_current(1).unwrap();
    }
    validate_branch_targets(&stream).unwrap();
    let branch = stream.iter().find(|instr| instr.id == InstrId(2)).unwrap();
    assert_eq!(branch.branch_target(), Some(InstrId(5)));
    assert_eq!(stream.position_of(InstrId(5)), Some(6));
}

#[test]
fn removal_after_moving_away_from_an_insert_is_refused() {
    let mut stream = body(CLAMP);
    let before = stream.clone();
    let mut cursor = Cursor::new(&mut stream);
    cursor.goto(5).unwrap();
    cursor.insert_replacement_call(TransformId::FloatMin).unwrap();
    // moving forgets the insertion, so nothing can take over the branch targets
    cursor.goto(6).unwrap();
    let err = cursor.remove_current(1).unwrap_err();
    assert!(matches!(err, Error::DanglingBranchTarget { removed: InstrId(5), .. }));
    drop(cursor);
    assert_eq!(stream.len(), before.len() + 1);
    assert!(stream.contains(InstrId(5)));
}

#[test]
fn backward_seek_and_peek() {
    let mut stream = body(CLAMP);
    let mut cursor = Cursor::new(&mut stream);
    cursor.goto_end();
    assert!(cursor.current().is_none());
    let branch = Pattern::single("branch", Predicate::branch()).with_direction(Direction::Backward);
    assert!(cursor.seek(&branch, Direction::Backward));
    assert_eq!(cursor.index(), 7);
    assert_eq!(cursor.peek(-1).map(|instr| instr.id), Some(InstrId(6)));
    assert_eq!(cursor.peek(1).map(|instr| instr.id), Some(InstrId(8)));
    assert!(cursor.peek(5).is_none());
}

#[test]
fn inserted_call_names_the_transform() {
    let mut stream = body("0000: ldarg 0\n0001: sign\n0002: ret\n");
    let mut cursor = Cursor::new(&mut stream);
    cursor.branch_to(InstrId(1)).unwrap();
    let id = cursor.insert_replacement_call(TransformId::Sign).unwrap();
    cursor.remove_current(1).unwrap();
    assert_eq!(id, InstrId(3));
    assert_eq!(
        cursor.stream().get(1).unwrap().callee(),
        Some(&Callee::Transform(TransformId::Sign))
    );
}
