use gravflip_core::{Callee, InstrId, TransformId, Value, Vec2};
use gravflip_gravity::GravityOrientation;
use gravflip_transform::document::RuleSetDocument;
use gravflip_transform::{Error, Interpreter, NoHostCalls, RuleEngine};
use gravflip_tests::body;

const DASH_RULES: &str = r#"{
    "name": "dash",
    "target": { "owner": "Player", "signature": "Dash(Vector2)" },
    "rules": [
        {
            "name": "dash offset",
            "pattern": [{ "op": "ldarg" }, { "constant": "(0.0, 2.0)" }, { "op": "add" }],
            "anchor": 2,
            "occurrence": { "exactly": 1 },
            "replacement": { "substitute": "VecAdd" }
        },
        {
            "name": "clamp",
            "pattern": ["rewritable"],
            "direction": "backward",
            "occurrence": { "at_most": 2 },
            "replacement": { "substitute": "FloatMin" },
            "reset": true
        }
    ]
}"#;

const DASH_BODY: &str = "
0000: ldarg 0
0001: ldc (0.0, 2.0)
0002: add
0003: ret
";

#[test]
fn document_rewrites_and_runs() {
    let (target, set) = RuleSetDocument::from_json(DASH_RULES)
        .unwrap()
        .compile()
        .unwrap();
    assert_eq!(target.to_string(), "Player::Dash(Vector2)");

    // the second rule finds nothing rewritable once the add is replaced
    let (patched, report) = RuleEngine::new()
        .rewrite(&target, &set, &body(DASH_BODY))
        .unwrap();
    assert_eq!(report.rules[0].sites, vec![InstrId(2)]);
    assert_eq!(report.rules[1].replaced, 0);
    assert_eq!(
        patched.get(2).unwrap().callee(),
        Some(&Callee::Transform(TransformId::VecAdd))
    );

    let args = [Value::Vector(Vec2::new(1.0, 3.0))];
    let inverted = GravityOrientation::Inverted;
    let result = Interpreter::new(&inverted)
        .run(&patched, &args, &mut NoHostCalls)
        .unwrap();
    assert_eq!(result, Some(Value::Vector(Vec2::new(1.0, 1.0))));
}

#[test]
fn document_round_trips_through_json() {
    let doc = RuleSetDocument::from_json(DASH_RULES).unwrap();
    let json = doc.to_json().unwrap();
    assert_eq!(RuleSetDocument::from_json(&json).unwrap(), doc);
}

#[test]
fn substitution_must_consume_something() {
    let json = r#"{
        "name": "stall",
        "target": { "owner": "Player", "signature": "Stall" },
        "rules": [
            {
                "name": "add",
                "pattern": [{ "op": "add" }],
                "consume": 0,
                "occurrence": { "all": {} },
                "replacement": { "substitute": "VecAdd" }
            }
        ]
    }"#;
    let doc = RuleSetDocument::from_json(json).unwrap();
    assert!(matches!(doc.compile(), Err(Error::Document(_))));
}
