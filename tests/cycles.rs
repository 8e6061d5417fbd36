use std::cell::RefCell;
use std::rc::Rc;

use weft::{default_container, render_error_chain, Error, Global, QualifierSet};

// --- Test Fixtures ---

// Two mutually-referencing node types; instances are shared through
// Rc<RefCell<..>> so injectors can wire the back edges after construction.
#[derive(Default, Debug)]
struct Hub {
  spoke: Option<SpokeHandle>,
}

#[derive(Default, Debug)]
struct Spoke {
  hub: Option<HubHandle>,
}

type HubHandle = Rc<RefCell<Hub>>;
type SpokeHandle = Rc<RefCell<Spoke>>;

fn hub_resource() -> Global<HubHandle> {
  Global::<HubHandle>::new(QualifierSet::new())
}

fn spoke_resource() -> Global<SpokeHandle> {
  Global::<SpokeHandle>::new(QualifierSet::new())
}

// --- Cycle Tests ---

#[test]
fn a_cycle_through_two_injectors_is_constructible() {
  // Arrange: both providers are dependency-free; each side wires the
  // other through an injector.
  let hub = hub_resource();
  let spoke = spoke_resource();

  hub
    .provide(HubHandle::default)
    .unwrap()
    .inject_with((spoke.clone(),), |this, (other,)| {
      this.borrow_mut().spoke = Some(other);
    });
  spoke
    .provide(SpokeHandle::default)
    .unwrap()
    .inject_with((hub.clone(),), |this, (other,)| {
      this.borrow_mut().hub = Some(other);
    });

  let mut report = String::new();
  assert!(default_container().check_consistency(&mut report));

  // Act
  let h = hub.get().unwrap();
  let s = spoke.get().unwrap();

  // Assert: both back edges point at the container-held instances.
  assert!(Rc::ptr_eq(h.borrow().spoke.as_ref().unwrap(), &s));
  assert!(Rc::ptr_eq(s.borrow().hub.as_ref().unwrap(), &h));
}

#[test]
fn a_cycle_with_one_provider_edge_and_one_injector_edge_is_constructible() {
  // Hub's provider consumes the spoke; the spoke gets its hub through an
  // injector afterwards.
  let hub = hub_resource();
  let spoke = spoke_resource();

  hub
    .provide_with((spoke.clone(),), |(other,)| {
      Rc::new(RefCell::new(Hub { spoke: Some(other) }))
    })
    .unwrap();
  spoke
    .provide(SpokeHandle::default)
    .unwrap()
    .inject_with((hub.clone(),), |this, (other,)| {
      this.borrow_mut().hub = Some(other);
    });

  let mut report = String::new();
  assert!(default_container().check_consistency(&mut report));

  let h = hub.get().unwrap();
  let s = spoke.get().unwrap();

  assert!(Rc::ptr_eq(h.borrow().spoke.as_ref().unwrap(), &s));
  assert!(Rc::ptr_eq(s.borrow().hub.as_ref().unwrap(), &h));
}

#[test]
fn the_mirrored_variant_is_also_constructible() {
  // Hub is default-constructed and injected; the spoke's provider
  // consumes the hub.
  let hub = hub_resource();
  let spoke = spoke_resource();

  hub
    .provide(HubHandle::default)
    .unwrap()
    .inject_with((spoke.clone(),), |this, (other,)| {
      this.borrow_mut().spoke = Some(other);
    });
  spoke
    .provide_with((hub.clone(),), |(other,)| {
      Rc::new(RefCell::new(Spoke { hub: Some(other) }))
    })
    .unwrap();

  let h = hub.get().unwrap();
  let s = spoke.get().unwrap();

  assert!(Rc::ptr_eq(h.borrow().spoke.as_ref().unwrap(), &s));
  assert!(Rc::ptr_eq(s.borrow().hub.as_ref().unwrap(), &h));
}

#[test]
fn a_pure_provider_cycle_is_rejected() {
  // Arrange: both providers require the other side already provided; no
  // interleaving exists.
  let hub = hub_resource();
  let spoke = spoke_resource();

  hub
    .provide_with((spoke.clone(),), |(other,)| {
      Rc::new(RefCell::new(Hub { spoke: Some(other) }))
    })
    .unwrap();
  spoke
    .provide_with((hub.clone(),), |(other,)| {
      Rc::new(RefCell::new(Spoke { hub: Some(other) }))
    })
    .unwrap();

  // The checker sees the cycle offline.
  let mut report = String::new();
  assert!(!default_container().check_consistency(&mut report));
  assert!(report.contains("cyclical dependency"));

  // And the engine reports it at instantiation time, in the cause chain.
  let err = hub.get().unwrap_err();
  assert!(matches!(err, Error::Instantiation { .. }));
  assert!(render_error_chain(&err).contains("cyclical dependency"));
}

#[test]
fn a_provider_depending_on_its_own_resource_is_rejected() {
  let hub = hub_resource();
  hub
    .provide_with((hub.clone(),), |(_other,)| HubHandle::default())
    .unwrap();

  let err = hub.get().unwrap_err();
  assert!(render_error_chain(&err).contains("cyclical dependency"));
}

#[test]
fn a_failed_provisioning_leaves_no_residue() {
  // The first get fails (the dependency has no provider); after the
  // dependency is provided, the same resource materializes cleanly,
  // proving the partially-built asset was unwound.
  let hub = hub_resource();
  let spoke = spoke_resource();

  hub
    .provide_with((spoke.clone(),), |(other,)| {
      Rc::new(RefCell::new(Hub { spoke: Some(other) }))
    })
    .unwrap();

  assert!(hub.get().is_err());

  spoke.provide(SpokeHandle::default).unwrap();
  let h = hub.get().unwrap();
  assert!(h.borrow().spoke.is_some());
}
