use std::cell::{Cell, RefCell};
use std::rc::Rc;

use weft::{
  default_container, define_qualifier, qualifiers, Container, GuardedScope, QualifierSet, Resource,
};

// --- Test Fixtures ---

define_qualifier!(Name(String));

// --- Registry Tests ---

#[test]
fn declaring_a_resource_twice_yields_the_same_manager() {
  let container = Container::new();
  let r = Resource::<i64>::new(qualifiers![Name::qualifier("idempotent")]);

  assert!(container.get_declared(&r).is_none());
  assert_eq!(container.manager_count(), 0);

  let first = container.declare(&r);
  let second = container.declare(&r);
  assert!(Rc::ptr_eq(&first, &second));
  assert_eq!(container.manager_count(), 1);

  let looked_up = container.get_declared(&r).unwrap();
  assert!(Rc::ptr_eq(&first, &looked_up));
  assert_eq!(*looked_up.rid(), r.id());
}

#[test]
fn clearing_disposes_assets_and_recreates_managers_from_scratch() {
  let container = Container::new();
  let disposals = Rc::new(Cell::new(0));
  let r = Resource::<i64>::new(qualifiers![Name::qualifier("cleared")]);

  let counter = disposals.clone();
  container.provide(&r, || 1).unwrap();
  container.dispose(&r, move |_| counter.set(counter.get() + 1));

  assert_eq!(container.get(&r).unwrap(), 1);
  container.clear().unwrap();

  // The instance was disposed exactly once and the registry is empty.
  assert_eq!(disposals.get(), 1);
  assert_eq!(container.manager_count(), 0);
  assert!(container.get_declared(&r).is_none());

  // Re-declaration starts from scratch: no provider survives the clear.
  let err = container.get(&r).unwrap_err();
  assert!(err.to_string().contains("undeclared resource"));

  container.provide(&r, || 2).unwrap();
  assert_eq!(container.get(&r).unwrap(), 2);
  container.clear().unwrap();
  assert_eq!(disposals.get(), 2);
}

#[test]
fn clearing_twice_is_harmless() {
  let container = Container::new();
  let r = Resource::<i64>::new(QualifierSet::new());
  container.provide(&r, || 3).unwrap();
  container.get(&r).unwrap();

  container.clear().unwrap();
  container.clear().unwrap();
  assert_eq!(container.manager_count(), 0);
}

#[test]
fn clearing_also_empties_active_scope_contexts() {
  struct Session;
  type Scope = GuardedScope<Session>;

  let container = Container::new();
  let disposals = Rc::new(Cell::new(0));
  let r = Resource::<Rc<Cell<i64>>, Scope>::new(QualifierSet::new());

  let counter = disposals.clone();
  container.provide(&r, || Rc::new(Cell::new(4))).unwrap();
  container.dispose(&r, move |_| counter.set(counter.get() + 1));

  let _active = Scope::enter_in(&container);
  let before = container.get(&r).unwrap();
  container.clear().unwrap();
  assert_eq!(disposals.get(), 1);

  // The activation is still live, but the instance is gone; the next
  // request would re-provision, and fails here because managers were
  // dropped with the registry.
  assert!(Scope::is_active_in(&container));
  assert!(container.get(&r).is_err());

  container.provide(&r, || Rc::new(Cell::new(5))).unwrap();
  let after = container.get(&r).unwrap();
  assert!(!Rc::ptr_eq(&before, &after));
  assert_eq!(after.get(), 5);
}

#[test]
fn a_disposer_dependency_sees_the_live_instance_during_clear() {
  let container = Container::new();

  let provisions = Rc::new(Cell::new(0));
  let logger_disposals = Rc::new(Cell::new(0));
  let observed: Rc<RefCell<Option<Rc<Cell<i64>>>>> = Rc::new(RefCell::new(None));

  let logger = Resource::<Rc<Cell<i64>>>::new(qualifiers![Name::qualifier("logger")]);
  let worker = Resource::<Rc<Cell<i64>>>::new(qualifiers![Name::qualifier("worker")]);

  let count = provisions.clone();
  container
    .provide(&logger, move || {
      count.set(count.get() + 1);
      Rc::new(Cell::new(0))
    })
    .unwrap();
  container.provide(&worker, || Rc::new(Cell::new(7))).unwrap();

  // The worker's disposer consumes the logger, which lives in the same
  // context.
  let seen = observed.clone();
  container.dispose_with(&worker, (logger.clone(),), move |_, (logger,)| {
    logger.set(logger.get() + 1);
    *seen.borrow_mut() = Some(logger);
  });
  let count = logger_disposals.clone();
  container.dispose(&logger, move |_| count.set(count.get() + 1));

  let live_logger = container.get(&logger).unwrap();
  container.get(&worker).unwrap();
  assert_eq!(provisions.get(), 1);

  container.clear().unwrap();

  // The worker's disposer was handed the live logger instance; nothing
  // was re-provisioned during the clear.
  assert_eq!(provisions.get(), 1);
  let seen = observed.borrow().clone().unwrap();
  assert!(Rc::ptr_eq(&seen, &live_logger));
  assert_eq!(live_logger.get(), 1);

  // And the logger itself was still disposed exactly once.
  assert_eq!(logger_disposals.get(), 1);
}

#[test]
fn clearing_the_global_scope_keeps_the_managers() {
  let container = Container::new();
  let disposals = Rc::new(Cell::new(0));
  let r = Resource::<Rc<Cell<i64>>>::new(qualifiers![Name::qualifier("scope-clear")]);

  let counter = disposals.clone();
  container.provide(&r, || Rc::new(Cell::new(6))).unwrap();
  container.dispose(&r, move |_| counter.set(counter.get() + 1));

  let before = container.get(&r).unwrap();
  weft::GlobalScope::clear(&container).unwrap();
  assert_eq!(disposals.get(), 1);

  // The registration survives; the next request re-provisions.
  assert_eq!(container.manager_count(), 1);
  let after = container.get(&r).unwrap();
  assert!(!Rc::ptr_eq(&before, &after));
}

#[test]
fn containers_are_isolated_from_each_other_and_from_the_default() {
  let custom = Container::new();
  let r = Resource::<String>::new(qualifiers![Name::qualifier("isolated")]);

  custom
    .provide(&r, || "in the custom container".to_owned())
    .unwrap();
  assert_eq!(custom.get(&r).unwrap(), "in the custom container");

  // The default container never heard of it.
  assert!(default_container().get_declared(&r).is_none());
  assert!(r.get().is_err());

  // And a second custom container is equally blank.
  assert!(Container::new().get(&r).is_err());
}

#[test]
fn handles_are_cheap_aliases_of_the_same_resource() {
  let container = Container::new();
  let original = Resource::<Rc<String>>::new(qualifiers![Name::qualifier("alias")]);
  let alias = Resource::<Rc<String>>::new(qualifiers![Name::qualifier("alias")]);
  let other = Resource::<Rc<String>>::new(qualifiers![Name::qualifier("other")]);

  assert_eq!(original.id(), alias.id());
  assert_ne!(original.id(), other.id());

  container
    .provide(&original, || Rc::new("shared".to_owned()))
    .unwrap();
  container.provide(&other, || Rc::new("else".to_owned())).unwrap();

  let a = container.get(&original).unwrap();
  let b = container.get(&alias).unwrap();
  assert!(Rc::ptr_eq(&a, &b));
  assert!(!Rc::ptr_eq(&a, &container.get(&other).unwrap()));
}

#[test]
fn errors_name_the_offending_resource() {
  let container = Container::new();
  let r = Resource::<i64>::new(qualifiers![Name::qualifier("culprit")]);

  let err = container.get(&r).unwrap_err();
  let message = err.to_string();
  assert!(message.contains("RESOURCE("));
  assert!(message.contains("@Name(culprit)"));
  assert!(message.contains("i64"));
}
