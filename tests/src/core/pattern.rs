use gravflip_core::pattern::{count_matches, find_all, find_next, Direction, Pattern, Predicate};
use gravflip_core::{HostOp, Opcode, TransformId, Value, Vec2};
use gravflip_tests::body;

const FALL: &str = "
0000: ldarg 0
0001: ldc (0.0, -1.0)
0002: add
0003: ldarg 1
0004: ldc (0.0, 1.0)
0005: add
0006: ldarg 2
0007: add
0008: ret
";

fn unit_y_add() -> Pattern {
    Pattern::new("unit-y add", vec![Predicate::unit_y(), Predicate::op(Opcode::Add)])
}

#[test]
fn compound_pattern_reports_window_start() {
    let stream = body(FALL);
    let slice = stream.as_slice();
    assert_eq!(find_next(slice, 0, &unit_y_add(), Direction::Forward), Some(1));
    assert_eq!(find_next(slice, 2, &unit_y_add(), Direction::Forward), Some(4));
    assert_eq!(find_next(slice, 5, &unit_y_add(), Direction::Forward), None);
    assert_eq!(find_all(slice, &unit_y_add()), vec![1, 4]);
}

#[test]
fn backward_search_mirrors_forward() {
    let stream = body(FALL);
    let slice = stream.as_slice();
    let pattern = unit_y_add();

    assert_eq!(find_next(slice, slice.len(), &pattern, Direction::Backward), Some(4));
    assert_eq!(find_next(slice, 3, &pattern, Direction::Backward), Some(1));
    assert_eq!(find_next(slice, 0, &pattern, Direction::Backward), None);

    // every forward match is found backward, in reverse order
    let mut backward = Vec::new();
    let mut from = slice.len();
    while let Some(index) = find_next(slice, from, &pattern, Direction::Backward) {
        backward.push(index);
        if index == 0 {
            break;
        }
        from = index - 1;
    }
    backward.reverse();
    assert_eq!(backward, find_all(slice, &pattern));
}

#[test]
fn lookahead_predicates_do_not_consume() {
    let stream = body(FALL);
    let add_after_arg = Pattern::single(
        "add after ldarg",
        Predicate::op(Opcode::Add).preceded_by(Predicate::host(HostOp::LoadArg)),
    );
    assert_eq!(find_all(stream.as_slice(), &add_after_arg), vec![7]);

    let arg_before_add = Pattern::single(
        "ldarg before add",
        Predicate::host(HostOp::LoadArg).followed_by(Predicate::op(Opcode::Add)),
    );
    assert_eq!(find_all(stream.as_slice(), &arg_before_add), vec![6]);
    assert_eq!(arg_before_add.len(), 1);
}

#[test]
fn combinators() {
    let stream = body(FALL);
    let downward = Predicate::constant(Value::Vector(Vec2::new(0.0, -1.0)));
    let not_down = Predicate::unit_y().and(downward.not());
    assert_eq!(count_matches(stream.as_slice(), &Pattern::single("up", not_down)), 1);

    let either = Predicate::op(Opcode::Sign).or(Predicate::host(HostOp::Return));
    assert_eq!(find_all(stream.as_slice(), &Pattern::single("end", either)), vec![8]);

    let none = Pattern::single(
        "injected",
        Predicate::call_transform(TransformId::VecAdd),
    );
    assert_eq!(count_matches(stream.as_slice(), &none), 0);
}

#[test]
fn anchor_and_consume_are_clamped_to_the_window() {
    let pattern = unit_y_add().with_anchor(5);
    assert_eq!(pattern.anchor(), 1);
    assert_eq!(pattern.consume(), 1);

    let pattern = unit_y_add().with_consume(9);
    assert_eq!(pattern.consume(), 2);

    let empty = Pattern::new("empty", Vec::new());
    assert!(find_next(body(FALL).as_slice(), 0, &empty, Direction::Forward).is_none());
}
