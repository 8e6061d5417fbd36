use std::rc::Rc;

use weft::{define_qualifier, qualifiers, Container, Global};

// --- Test Fixtures ---

define_qualifier!(Name(String));

fn named(name: &str) -> Global<Rc<i64>> {
  Global::<Rc<i64>>::new(qualifiers![Name::qualifier(name)])
}

// --- Checker Tests ---

#[test]
fn a_complete_acyclic_configuration_passes_with_an_empty_report() {
  let container = Container::new();
  let a = named("a");
  let b = named("b");

  container.provide(&a, || Rc::new(1)).unwrap();
  container
    .provide_with(&b, (a.clone(),), |(a,)| Rc::new(*a + 1))
    .unwrap();
  container.inject_with(&b, (a.clone(),), |_, _| {});
  container.dispose(&a, |_| {});
  container.dispose(&b, |_| {});

  let mut report = String::new();
  assert!(container.check_consistency(&mut report));
  assert!(report.is_empty(), "unexpected report: {report}");
}

#[test]
fn an_injector_cycle_passes() {
  let container = Container::new();
  let a = named("a");
  let b = named("b");

  container.provide(&a, || Rc::new(1)).unwrap();
  container.provide(&b, || Rc::new(2)).unwrap();
  container.inject_with(&a, (b.clone(),), |_, _| {});
  container.inject_with(&b, (a.clone(),), |_, _| {});

  let mut report = String::new();
  assert!(container.check_consistency(&mut report));
}

#[test]
fn a_provider_cycle_fails_and_names_both_events() {
  let container = Container::new();
  let a = named("a");
  let b = named("b");

  container
    .provide_with(&a, (b.clone(),), |(b,)| Rc::new(*b + 1))
    .unwrap();
  container
    .provide_with(&b, (a.clone(),), |(a,)| Rc::new(*a + 1))
    .unwrap();

  let mut report = String::new();
  assert!(!container.check_consistency(&mut report));
  assert!(report.contains("cyclical dependency"));
  assert!(report.contains("[provided]"));
  assert!(report.contains("@Name(a)"));
  assert!(report.contains("@Name(b)"));
}

#[test]
fn a_declared_resource_without_provider_fails_the_check() {
  let container = Container::new();
  let a = named("a");
  let b = named("b");

  // Registering b's provider auto-declares a, which never gets one.
  container
    .provide_with(&b, (a.clone(),), |(a,)| Rc::new(*a + 1))
    .unwrap();

  let mut report = String::new();
  assert!(!container.check_consistency(&mut report));
  assert!(report.contains("no provider is set"));
  assert!(report.contains("@Name(a)"));

  // Completing the configuration makes the check pass.
  container.provide(&a, || Rc::new(1)).unwrap();
  let mut report = String::new();
  assert!(container.check_consistency(&mut report));
}

#[test]
fn a_disposer_dependency_orders_disposal_and_passes() {
  let container = Container::new();
  let logger = named("logger");
  let worker = named("worker");

  container.provide(&logger, || Rc::new(0)).unwrap();
  container.provide(&worker, || Rc::new(1)).unwrap();
  // The worker's disposer consumes the logger, so the logger must be
  // disposed after the worker. That is satisfiable on its own.
  container.dispose_with(&worker, (logger.clone(),), |_, _| {});

  let mut report = String::new();
  assert!(container.check_consistency(&mut report));
}

#[test]
fn mutually_dependent_disposers_fail_the_check() {
  let container = Container::new();
  let a = named("a");
  let b = named("b");

  container.provide(&a, || Rc::new(1)).unwrap();
  container.provide(&b, || Rc::new(2)).unwrap();
  // Each disposer consumes the other resource: each must then be
  // disposed after the other, which is unsatisfiable.
  container.dispose_with(&a, (b.clone(),), |_, _| {});
  container.dispose_with(&b, (a.clone(),), |_, _| {});

  let mut report = String::new();
  assert!(!container.check_consistency(&mut report));
  assert!(report.contains("cyclical dependency"));
  assert!(report.contains("[disposed]"));
}
