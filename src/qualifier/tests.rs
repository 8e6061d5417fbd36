use super::*;
use crate::{define_qualifier, qualifiers};

define_qualifier!(Name(String));
define_qualifier!(Size(u64));
define_qualifier!(Primary);

mod nested {
  crate::define_qualifier!(pub Primary);
}

#[test]
fn payload_kinds_round_trip() {
  let n = Name::qualifier("foo");
  assert_eq!(n.as_str(), Some("foo"));
  assert_eq!(n.as_int(), None);

  let s = Size::qualifier(42u64);
  assert_eq!(s.as_uint(), Some(42));
  assert_eq!(s.as_str(), None);

  assert_eq!(Primary::qualifier().payload(), &QualifierPayload::None);
}

#[test]
fn equality_is_tag_then_payload() {
  assert_eq!(Name::qualifier("foo"), Name::qualifier("foo"));
  assert_ne!(Name::qualifier("foo"), Name::qualifier("bar"));
  assert_ne!(Qualifier::default(), Qualifier::all());
  assert_ne!(Qualifier::default(), Name::qualifier("foo"));

  // Same tag, different payload: similar but not equal.
  assert!(Name::qualifier("foo").is_similar(&Name::qualifier("bar")));

  // Same-named tags declared in different modules are distinct kinds.
  assert_ne!(Primary::qualifier(), nested::Primary::qualifier());
}

#[test]
fn equal_qualifiers_hash_alike() {
  assert_eq!(
    Name::qualifier("foo").hash_code(),
    Name::qualifier("foo").hash_code()
  );
  assert_eq!(Qualifier::all().hash_code(), Qualifier::all().hash_code());
}

#[test]
fn display_matches_tag_and_payload() {
  assert_eq!(Qualifier::all().to_string(), "@All");
  assert_eq!(Qualifier::default().to_string(), "@Default");
  assert_eq!(Qualifier::null().to_string(), "@Null");
  assert_eq!(Name::qualifier("foo").to_string(), "@Name(foo)");
  assert_eq!(Size::qualifier(9u64).to_string(), "@Size(9)");
}

#[test]
fn set_construction_keeps_one_per_kind() {
  let set = qualifiers![
    Name::qualifier("foo"),
    Name::qualifier("bar"),
    Name::qualifier("baz")
  ];
  assert_eq!(set.len(), 1);

  assert_eq!(qualifiers![].len(), 0);
  assert_eq!(QualifierSet::of(Qualifier::null()).len(), 1);
  assert_eq!(
    qualifiers![
      Qualifier::all(),
      Qualifier::null(),
      Qualifier::null(),
      Qualifier::default()
    ]
    .len(),
    3
  );
}

#[test]
fn set_membership_and_similarity() {
  let dfoo = qualifiers![Qualifier::default(), Name::qualifier("foo")];
  assert_eq!(dfoo.len(), 2);
  assert!(dfoo.contains(&Qualifier::default()));
  assert!(dfoo.contains(&Name::qualifier("foo")));
  assert!(!dfoo.contains(&Name::qualifier("bar")));
  assert!(dfoo.contains_similar(&Name::qualifier("bar")));
}

#[test]
fn set_mutators_maintain_the_xor_hash() {
  let check = |set: &QualifierSet| {
    let xor = set.iter().fold(0u64, |acc, q| acc ^ q.hash_code());
    assert_eq!(set.hash_code(), xor);
  };

  let mut set = qualifiers![Qualifier::default(), Name::qualifier("foo")];
  check(&set);

  set.update(Name::qualifier("bar"));
  check(&set);
  assert!(set.contains(&Name::qualifier("bar")));

  assert!(set.delete_equal(&Name::qualifier("bar")));
  check(&set);
  assert!(!set.delete_equal(&Name::qualifier("zap")));

  set.update(Size::qualifier(4u64));
  check(&set);
  assert!(set.delete_similar(&Size::qualifier(9u64)));
  check(&set);

  set.clear();
  check(&set);
  assert_eq!(set.hash_code(), 0);
}

#[test]
fn set_matching_without_all_is_equality() {
  let dflt = QualifierSet::of(Qualifier::default());
  let foo = QualifierSet::of(Name::qualifier("foo"));
  let dfoo = qualifiers![Qualifier::default(), Name::qualifier("foo")];
  let bar = QualifierSet::of(Name::qualifier("bar"));
  let dbar = qualifiers![Qualifier::default(), Name::qualifier("bar")];

  assert!(dflt.matches(&dflt));
  assert!(!dflt.matches(&foo));
  assert!(!dflt.matches(&dfoo));

  assert!(foo.matches(&foo));
  assert!(!foo.matches(&dflt));
  assert!(!dfoo.matches(&dflt));

  assert!(!foo.matches(&bar));
  assert!(!dfoo.matches(&foo));
  assert!(dfoo.matches(&dfoo));
  assert!(!dfoo.matches(&dbar));
  assert!(!dfoo.matches(&bar));
}

#[test]
fn empty_set_matches_only_empty() {
  let empty = QualifierSet::new();
  assert!(empty.matches(&QualifierSet::new()));
  assert!(!empty.matches(&QualifierSet::of(Qualifier::default())));
  assert!(!empty.matches(&QualifierSet::of(Name::qualifier("foo"))));
}

#[test]
fn all_marker_relaxes_matching_to_containment() {
  let empty = QualifierSet::new();
  let dflt = QualifierSet::of(Qualifier::default());
  let foo = QualifierSet::of(Name::qualifier("foo"));
  let dfoo = qualifiers![Qualifier::default(), Name::qualifier("foo")];
  let bar = QualifierSet::of(Name::qualifier("bar"));
  let dbar = qualifiers![Qualifier::default(), Name::qualifier("bar")];

  let all = QualifierSet::of(Qualifier::all());
  assert!(all.matches(&empty));
  assert!(all.matches(&dflt));
  assert!(all.matches(&dfoo));
  assert!(all.matches(&foo));
  assert!(all.matches(&bar));
  assert!(all.matches(&dbar));

  let adflt = qualifiers![Qualifier::all(), Qualifier::default()];
  assert!(!adflt.matches(&empty));
  assert!(adflt.matches(&dflt));
  assert!(adflt.matches(&dfoo));
  assert!(!adflt.matches(&foo));
  assert!(!adflt.matches(&bar));
  assert!(adflt.matches(&dbar));

  let afoo = qualifiers![Qualifier::all(), Name::qualifier("foo")];
  assert!(!afoo.matches(&empty));
  assert!(!afoo.matches(&dflt));
  assert!(afoo.matches(&dfoo));
  assert!(afoo.matches(&foo));
  assert!(!afoo.matches(&bar));
  assert!(!afoo.matches(&dbar));

  // The individual matching predicate: All matches everything.
  assert!(Qualifier::all().matches(&Name::qualifier("foo")));
  assert!(!Name::qualifier("foo").matches(&Qualifier::all()));
}

#[test]
fn set_equality_ignores_insertion_order() {
  let a = qualifiers![Qualifier::default(), Name::qualifier("foo")];
  let b = qualifiers![Name::qualifier("foo"), Qualifier::default()];
  assert_eq!(a, b);

  use crate::internal::hash_of;
  assert_eq!(hash_of(&a), hash_of(&b));
}
