//! Sets of qualifiers with at most one member per kind.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;

use super::Qualifier;

/// A set of qualifiers holding at most one qualifier per kind.
///
/// Two qualifiers of the same kind are *similar*; inserting a qualifier
/// similar to an existing member replaces it. The set caches its hash as
/// the xor of its members' hashes, so mutation is cheap and hashing is
/// constant-time.
///
/// ```
/// use weft::{define_qualifier, qualifiers};
///
/// define_qualifier!(Name(String));
///
/// let set = qualifiers![weft::Qualifier::default(), Name::qualifier("foo")];
/// assert_eq!(set.len(), 2);
/// assert!(set.contains(&Name::qualifier("foo")));
/// assert!(!set.contains(&Name::qualifier("bar")));
/// assert!(set.contains_similar(&Name::qualifier("bar")));
/// ```
#[derive(Clone, Default)]
pub struct QualifierSet {
  by_tag: HashMap<TypeId, Qualifier>,
  hash: u64,
}

impl QualifierSet {
  /// Create an empty set.
  pub fn new() -> Self {
    Self::default()
  }

  /// Create a singleton set.
  pub fn of(q: Qualifier) -> Self {
    let mut set = Self::new();
    set.update(q);
    set
  }

  /// The number of qualifiers in the set.
  pub fn len(&self) -> usize {
    self.by_tag.len()
  }

  /// Whether the set is empty.
  pub fn is_empty(&self) -> bool {
    self.by_tag.is_empty()
  }

  /// Membership by equality: is a qualifier equal to `q` in the set?
  pub fn contains(&self, q: &Qualifier) -> bool {
    self.by_tag.get(&q.tag()).map_or(false, |member| member == q)
  }

  /// Membership by similarity: is a qualifier of `q`'s kind in the set,
  /// regardless of payload?
  pub fn contains_similar(&self, q: &Qualifier) -> bool {
    self.by_tag.contains_key(&q.tag())
  }

  /// Add `q` to the set, replacing any similar member.
  pub fn update(&mut self, q: Qualifier) {
    self.delete_similar(&q);
    self.hash ^= q.hash_code();
    self.by_tag.insert(q.tag(), q);
  }

  /// Add every qualifier from `iter`, replacing similar members.
  pub fn update_all(&mut self, iter: impl IntoIterator<Item = Qualifier>) {
    for q in iter {
      self.update(q);
    }
  }

  /// Remove the member similar to `q`, if any. Returns whether a removal
  /// happened.
  pub fn delete_similar(&mut self, q: &Qualifier) -> bool {
    match self.by_tag.remove(&q.tag()) {
      Some(removed) => {
        self.hash ^= removed.hash_code();
        true
      }
      None => false,
    }
  }

  /// Remove the member equal to `q`, if any. Returns whether a removal
  /// happened.
  pub fn delete_equal(&mut self, q: &Qualifier) -> bool {
    if self.contains(q) {
      self.delete_similar(q)
    } else {
      false
    }
  }

  /// Empty the set.
  pub fn clear(&mut self) {
    self.by_tag.clear();
    self.hash = 0;
  }

  /// Iterate over the members, in no particular order.
  pub fn iter(&self) -> impl Iterator<Item = &Qualifier> {
    self.by_tag.values()
  }

  /// The cached hash code: the xor of the members' hash codes.
  pub fn hash_code(&self) -> u64 {
    self.hash
  }

  fn contains_all_marker(&self) -> bool {
    self.by_tag.values().any(Qualifier::is_all)
  }

  /// The matching relation between a query set and an annotation set.
  ///
  /// If the query contains the all-matching qualifier, the query matches
  /// when every one of its other members is contained in `other`;
  /// otherwise matching is plain set equality. An empty set matches only
  /// an empty set.
  pub fn matches(&self, other: &QualifierSet) -> bool {
    if self.len() > other.len() + 1 {
      return false;
    }
    if self.contains_all_marker() {
      self
        .iter()
        .filter(|q| !q.is_all())
        .all(|q| other.contains(q))
    } else {
      self == other
    }
  }
}

impl PartialEq for QualifierSet {
  fn eq(&self, other: &Self) -> bool {
    self.len() == other.len() && self.iter().all(|q| other.contains(q))
  }
}

impl Eq for QualifierSet {}

impl std::hash::Hash for QualifierSet {
  fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
    state.write_u64(self.hash);
  }
}

impl FromIterator<Qualifier> for QualifierSet {
  fn from_iter<I: IntoIterator<Item = Qualifier>>(iter: I) -> Self {
    let mut set = Self::new();
    set.update_all(iter);
    set
  }
}

impl fmt::Display for QualifierSet {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut first = true;
    for q in self.iter() {
      if !first {
        write!(f, " ")?;
      }
      write!(f, "{}", q)?;
      first = false;
    }
    Ok(())
  }
}

impl fmt::Debug for QualifierSet {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{{{}}}", self)
  }
}
