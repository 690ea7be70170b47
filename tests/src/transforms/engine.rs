use gravflip_core::pattern::{count_matches, Pattern, Predicate};
use gravflip_core::validator::validate_branch_targets;
use gravflip_core::{HostOp, InstructionStream, Opcode, Operand, TransformId};
use gravflip_transform::library::{invert_vector_addition, swap_max};
use gravflip_transform::{Error, MethodId, OccurrenceSpec, RewriteRule, RuleEngine, RuleSet};
use gravflip_tests::body;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn target() -> MethodId {
    MethodId::new("Enemy", "Patrol")
}

fn add_pattern() -> Pattern {
    Pattern::single("add", Predicate::op(Opcode::Add))
}

/// Random body with exactly `adds` additions, the rest filler, and a back edge onto an add.
fn random_body(rng: &mut StdRng, adds: usize) -> InstructionStream {
    let mut stream = InstructionStream::new();
    let mut placed = 0;
    let mut first_add = None;
    while placed < adds || stream.len() < 8 {
        if placed < adds && rng.random_bool(0.4) {
            let id = stream.push(Opcode::Add, Vec::new()).unwrap();
            first_add.get_or_insert(id);
            placed += 1;
        } else {
            stream.push(Opcode::Other(HostOp::LoadArg), vec![Operand::Slot(0)]).unwrap();
        }
    }
    if let Some(id) = first_add {
        stream.push(Opcode::Branch, vec![Operand::Target(id)]).unwrap();
    }
    stream.push(Opcode::Other(HostOp::Return), Vec::new()).unwrap();
    stream
}

#[test]
fn all_and_first_replace_the_expected_number() {
    let mut rng = StdRng::seed_from_u64(2024);
    let engine = RuleEngine::new();
    for _ in 0..100 {
        let k = rng.random_range(1..6);
        let stream = random_body(&mut rng, k);
        assert_eq!(count_matches(stream.as_slice(), &add_pattern()), k);

        let all = RuleSet::new("all")
            .with_rule(invert_vector_addition().with_occurrence(OccurrenceSpec::ALL));
        let (patched, report) = engine.rewrite(&target(), &all, &stream).unwrap();
        assert_eq!(report.total_replaced(), k);
        assert_eq!(count_matches(patched.as_slice(), &add_pattern()), 0);
        assert_eq!(patched.len(), stream.len());
        validate_branch_targets(&patched).unwrap();

        let first = RuleSet::new("first").with_rule(invert_vector_addition());
        let (patched, report) = engine.rewrite(&target(), &first, &stream).unwrap();
        assert_eq!(report.total_replaced(), 1);
        assert_eq!(count_matches(patched.as_slice(), &add_pattern()), k - 1);
        validate_branch_targets(&patched).unwrap();
    }
}

#[test]
fn zero_matches_leave_the_body_identical() {
    let mut rng = StdRng::seed_from_u64(5);
    let engine = RuleEngine::new();
    for _ in 0..20 {
        let mut stream = random_body(&mut rng, 0);
        let original = stream.clone();
        let set = RuleSet::new("first").with_rule(invert_vector_addition());
        let err = engine.apply(&target(), &set, &mut stream).unwrap_err();
        assert!(matches!(err, Error::PatternNotFound { .. }));
        assert_eq!(stream, original);
    }
}

#[test]
fn failure_names_rule_and_target() {
    let stream = body("0000: ldarg 0\n0001: ldarg 1\n0002: add\n0003: ret\n");
    let set = RuleSet::new("patrol")
        .with_rule(invert_vector_addition())
        .with_rule(swap_max().with_reset());
    let err = RuleEngine::new()
        .rewrite(&target(), &set, &stream)
        .unwrap_err();
    match err {
        Error::PatternNotFound { rule, target } => {
            assert_eq!(rule, "max");
            assert_eq!(target, "Enemy::Patrol");
        }
        other => panic!("unexpected error {other}"),
    }
}

#[test]
fn report_serializes_sites() {
    let stream = body("0000: ldarg 0\n0001: ldarg 1\n0002: add\n0003: ret\n");
    let set = RuleSet::new("patrol").with_rule(invert_vector_addition());
    let (_, report) = RuleEngine::new().rewrite(&target(), &set, &stream).unwrap();
    let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
    assert_eq!(json["target"], "Enemy::Patrol");
    assert_eq!(json["rules"][0]["rule"], "vector addition");
    assert_eq!(json["rules"][0]["sites"][0], 2);
}

#[test]
fn zero_consume_still_replaces_the_anchor() {
    let stream = body("0000: ldarg 0\n0001: ldarg 1\n0002: add\n0003: ldarg 2\n0004: add\n0005: ret\n");
    let rule = RewriteRule::substitute("add", add_pattern().with_consume(0), TransformId::VecAdd)
        .with_occurrence(OccurrenceSpec::ALL);
    let set = RuleSet::new("patrol").with_rule(rule);
    let (patched, report) = RuleEngine::new().rewrite(&target(), &set, &stream).unwrap();
    assert_eq!(report.total_replaced(), 2);
    assert_eq!(patched.len(), stream.len());
    assert_eq!(count_matches(patched.as_slice(), &add_pattern()), 0);
}
