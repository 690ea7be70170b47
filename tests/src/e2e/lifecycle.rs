use gravflip_core::{InstructionStream, Value, Vec2};
use gravflip_gravity::{GravityCoordinator, GravityRequest};
use gravflip_tests::{init_tracing, MockHost};
use gravflip_transform::library::gravity_arithmetic;
use gravflip_transform::{
    Error, HookConfig, HookManager, Interpreter, LoadPolicy, MethodId, NoHostCalls,
    RuleSetDocument, SessionContext,
};

const JUMP: &str = "
0000: ldarg 0
0001: ldc (0.0, 4.0)
0002: add
0003: ret
";

const CLAMP: &str = "
0000: ldarg 0
0001: ldc 2.0
0002: min
0003: ret
";

const IDLE: &str = "
0000: ldarg 0
0001: ret
";

const CLAMP_RULES: &str = r#"{
  "name": "clamp",
  "target": { "owner": "Camera", "signature": "Clamp" },
  "rules": [
    {
      "name": "min",
      "pattern": [{ "op": "min" }],
      "occurrence": { "exactly": 1 },
      "replacement": { "substitute": "FloatMin" }
    }
  ]
}"#;

fn host() -> MockHost {
    MockHost::default()
        .with_method("Player", "Jump", JUMP)
        .with_method("Camera", "Clamp", CLAMP)
        .with_method("Enemy", "Idle", IDLE)
}

fn manager(host: &MockHost, policy: LoadPolicy) -> HookManager {
    let mut manager = HookManager::new(HookConfig {
        load_policy: policy,
        ..HookConfig::default()
    });
    manager
        .register_target(host, "Player", "Jump", gravity_arithmetic("jump"))
        .unwrap();
    let (target, rule_set) = RuleSetDocument::from_json(CLAMP_RULES)
        .unwrap()
        .compile()
        .unwrap();
    manager.register_rule_set(target, rule_set).unwrap();
    manager
}

#[test]
fn activated_bodies_respond_to_gravity() {
    init_tracing();
    let mut host = host();
    let mut manager = manager(&host, LoadPolicy::Transactional);
    manager.activate(&mut host).unwrap();

    let gravity = GravityCoordinator::default();
    let jump = host.body_of("Player", "Jump").clone();
    let clamp = host.body_of("Camera", "Clamp").clone();
    let start = [Value::Vector(Vec2::new(1.0, 1.0))];
    let speed = [Value::Float(5.0)];

    let run = |gravity: &GravityCoordinator, body: &InstructionStream, args: &[Value]| {
        Interpreter::new(gravity)
            .run(body, args, &mut NoHostCalls)
            .unwrap()
    };

    assert_eq!(
        run(&gravity, &jump, &start),
        Some(Value::Vector(Vec2::new(1.0, 5.0)))
    );
    assert_eq!(run(&gravity, &clamp, &speed), Some(Value::Float(2.0)));

    gravity.set_gravity(GravityRequest::Toggle, 1.0, true);
    assert_eq!(
        run(&gravity, &jump, &start),
        Some(Value::Vector(Vec2::new(1.0, -3.0)))
    );
    assert_eq!(run(&gravity, &clamp, &speed), Some(Value::Float(5.0)));
}

#[test]
fn load_cycles_restore_original_bodies() {
    init_tracing();
    let mut host = host();
    let originals = host.bodies.clone();
    let mut manager = manager(&host, LoadPolicy::Transactional);

    for _ in 0..3 {
        manager.activate(&mut host).unwrap();
        manager.activate(&mut host).unwrap();
        assert_eq!(manager.applied_targets().count(), 2);
        let idle = MethodId::new("Enemy", "Idle");
        assert_eq!(host.bodies[&idle], originals[&idle]);

        manager.deactivate(&mut host).unwrap();
        assert_eq!(host.bodies, originals);
    }
    // two patches plus two restores per cycle
    assert_eq!(host.installs.len(), 12);
}

#[test]
fn session_policy_drives_the_lifecycle() {
    init_tracing();
    let mut host = host();
    let originals = host.bodies.clone();
    let mut manager = manager(&host, LoadPolicy::Transactional);
    let policy = |session: &SessionContext| session.has_tag("inverted-gravity");

    let sessions = [
        (SessionContext::new("title"), false),
        (SessionContext::new("upside").with_tag("inverted-gravity"), true),
        (SessionContext::new("upside b").with_tag("inverted-gravity"), true),
        (SessionContext::new("credits").with_tag("music"), false),
    ];
    for (session, expected) in sessions {
        let required = manager
            .sync_with_session(&policy, &session, &mut host)
            .unwrap();
        assert_eq!(required, expected);
        assert_eq!(manager.is_loaded(), expected);
        assert_eq!(host.bodies == originals, !expected);
    }
}

#[test]
fn rejected_install_rolls_back_the_batch() {
    init_tracing();
    let mut host = host();
    host.reject = Some(MethodId::new("Camera", "Clamp"));
    let originals = host.bodies.clone();

    let mut transactional = manager(&host, LoadPolicy::Transactional);
    let err = transactional.activate(&mut host).unwrap_err();
    assert!(matches!(err, Error::Install { .. }));
    assert!(!transactional.is_loaded());
    assert_eq!(host.bodies, originals);

    let mut partial = manager(&host, LoadPolicy::Partial);
    assert!(partial.activate(&mut host).is_err());
    assert!(partial.is_loaded());
    assert_eq!(
        partial.applied_targets().cloned().collect::<Vec<_>>(),
        vec![MethodId::new("Player", "Jump")]
    );
    partial.deactivate(&mut host).unwrap();
    assert_eq!(host.bodies, originals);
}
