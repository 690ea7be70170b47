use gravflip_gravity::{
    Error, GravityChangeEvent, GravityCoordinator, GravityListener, GravityOrientation,
    GravityRequest, ListenerResult, MemoryStore, StateStore, GRAVITY_STATE_KEY,
};
use gravflip_tests::RecordingListener;
use std::cell::RefCell;
use std::rc::Rc;

#[test]
fn checkpoint_restores_orientation_without_events() {
    let gravity = GravityCoordinator::default();
    let listener = Rc::new(RecordingListener::new("hud"));
    gravity.subscribe(&listener);

    let mut store = MemoryStore::new();
    gravity.set_gravity(GravityRequest::Inverted, 1.0, true);
    gravity.save(&mut store).unwrap();
    assert!(store.get(GRAVITY_STATE_KEY).is_some());

    gravity.set_gravity(GravityRequest::Normal, 1.0, false);
    assert_eq!(listener.events().len(), 2);

    assert!(gravity.restore(&store).unwrap());
    assert_eq!(gravity.current_gravity(), GravityOrientation::Inverted);
    assert_eq!(listener.events().len(), 2);
}

#[test]
fn corrupt_checkpoint_is_an_error() {
    let mut store = MemoryStore::new();
    store
        .persist(GRAVITY_STATE_KEY, "{\"orientation\":\"Sideways\"}".into())
        .unwrap();
    let gravity = GravityCoordinator::default();
    assert!(matches!(gravity.restore(&store), Err(Error::Serialize(_))));
    assert_eq!(gravity.current_gravity(), GravityOrientation::Normal);
}

/// Saves and tries to restore from inside the fan-out.
struct Checkpointer {
    store: RefCell<MemoryStore>,
    restore_failed: RefCell<bool>,
}

impl GravityListener for Checkpointer {
    fn name(&self) -> &str {
        "checkpointer"
    }

    fn on_gravity_changed(&self, event: GravityChangeEvent, gravity: &GravityCoordinator) -> ListenerResult {
        if event.was_toggle_request {
            return Ok(());
        }
        gravity.set_gravity(GravityRequest::Toggle, 1.0, false);
        gravity.save(&mut *self.store.borrow_mut())?;
        *self.restore_failed.borrow_mut() = matches!(
            gravity.restore(&*self.store.borrow()),
            Err(Error::DuringDispatch(_))
        );
        Ok(())
    }
}

#[test]
fn checkpoints_taken_mid_fan_out_carry_pending_requests() {
    let gravity = GravityCoordinator::default();
    let checkpointer = Rc::new(Checkpointer {
        store: RefCell::new(MemoryStore::new()),
        restore_failed: RefCell::new(false),
    });
    gravity.subscribe(&checkpointer);

    gravity.set_gravity(GravityRequest::Inverted, 1.0, false);
    assert!(*checkpointer.restore_failed.borrow());
    // the queued toggle ran after the fan-out
    assert_eq!(gravity.current_gravity(), GravityOrientation::Normal);

    let store = checkpointer.store.borrow().clone();
    let snapshot = gravflip_gravity::GravitySnapshot::from_json(
        &store.restore(GRAVITY_STATE_KEY).unwrap().unwrap(),
    )
    .unwrap();
    assert_eq!(snapshot.orientation, GravityOrientation::Inverted);
    assert_eq!(snapshot.pending.len(), 1);

    // replaying the checkpoint reaches the same state
    let replay = GravityCoordinator::default();
    let listener = Rc::new(RecordingListener::new("replay"));
    replay.subscribe(&listener);
    assert!(replay.restore(&store).unwrap());
    assert_eq!(replay.current_gravity(), GravityOrientation::Normal);
    assert_eq!(listener.events().len(), 1);
}
