//! Qualifiers: tagged runtime annotations used to distinguish resources
//! that share an instance type.
//!
//! A qualifier is essentially a runtime enum value with an optional typed
//! payload. Each qualifier kind is identified by a Rust marker type (its
//! *tag*); two qualifiers are *similar* when their tags match and *equal*
//! when both tag and payload match. Sets of qualifiers annotate resources
//! (see [`QualifierSet`]).
//!
//! Three kinds are predeclared: [`Qualifier::all`] (matches any other
//! qualifier), [`Qualifier::default`] and [`Qualifier::null`] (plain
//! zero-payload sentinels).
//!
//! New kinds are declared with the [`define_qualifier!`](crate::define_qualifier)
//! macro:
//!
//! ```
//! use weft::define_qualifier;
//!
//! define_qualifier!(Name(String));
//! define_qualifier!(Primary);
//!
//! let q = Name::qualifier("foo");
//! assert_eq!(q, Name::qualifier("foo"));
//! assert!(q.is_similar(&Name::qualifier("bar")));
//! assert_ne!(q, Name::qualifier("bar"));
//! assert_eq!(q.to_string(), "@Name(foo)");
//! assert_eq!(Primary::qualifier().to_string(), "@Primary");
//! ```

mod set;
#[cfg(test)]
mod tests;

pub use set::QualifierSet;

use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::internal::{hash_combine, hash_of, short_type_name};

/// The payload carried by a qualifier, if any.
///
/// Payloads participate in equality and hashing of the qualifier. The
/// variant model keeps payloads hashable and comparable without the
/// virtual dispatch a fully open payload type would need.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QualifierPayload {
  /// No payload: the qualifier is identified by its tag alone.
  None,
  /// A boolean payload.
  Bool(bool),
  /// A signed integer payload.
  Int(i64),
  /// An unsigned integer payload.
  Uint(u64),
  /// A string payload.
  Str(String),
}

impl fmt::Display for QualifierPayload {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      QualifierPayload::None => Ok(()),
      QualifierPayload::Bool(v) => write!(f, "{}", v),
      QualifierPayload::Int(v) => write!(f, "{}", v),
      QualifierPayload::Uint(v) => write!(f, "{}", v),
      QualifierPayload::Str(v) => write!(f, "{}", v),
    }
  }
}

impl From<bool> for QualifierPayload {
  fn from(v: bool) -> Self {
    QualifierPayload::Bool(v)
  }
}
impl From<i32> for QualifierPayload {
  fn from(v: i32) -> Self {
    QualifierPayload::Int(v.into())
  }
}
impl From<i64> for QualifierPayload {
  fn from(v: i64) -> Self {
    QualifierPayload::Int(v)
  }
}
impl From<u32> for QualifierPayload {
  fn from(v: u32) -> Self {
    QualifierPayload::Uint(v.into())
  }
}
impl From<u64> for QualifierPayload {
  fn from(v: u64) -> Self {
    QualifierPayload::Uint(v)
  }
}
impl From<usize> for QualifierPayload {
  fn from(v: usize) -> Self {
    QualifierPayload::Uint(v as u64)
  }
}
impl From<&str> for QualifierPayload {
  fn from(v: &str) -> Self {
    QualifierPayload::Str(v.to_owned())
  }
}
impl From<String> for QualifierPayload {
  fn from(v: String) -> Self {
    QualifierPayload::Str(v)
  }
}

// Tag types of the predeclared qualifier kinds. The trailing "Tag" is
// stripped from displayed names.
struct AllTag;
struct DefaultTag;
struct NullTag;

static ALL: Lazy<Qualifier> = Lazy::new(Qualifier::void::<AllTag>);
static DEFAULT: Lazy<Qualifier> = Lazy::new(Qualifier::void::<DefaultTag>);
static NULL: Lazy<Qualifier> = Lazy::new(Qualifier::void::<NullTag>);

struct QualInner {
  tag: TypeId,
  tag_name: &'static str,
  payload: QualifierPayload,
  hash: u64,
}

/// A tagging value used to annotate resources.
///
/// Qualifier values are cheap-clone shared handles; the underlying state
/// (tag, payload and cached hash) is immutable after construction.
#[derive(Clone)]
pub struct Qualifier {
  inner: Arc<QualInner>,
}

impl Qualifier {
  /// Build a zero-payload qualifier of kind `Tag`.
  pub fn void<Tag: 'static>() -> Self {
    Self::build::<Tag>(QualifierPayload::None)
  }

  /// Build a qualifier of kind `Tag` carrying a payload.
  pub fn with_value<Tag: 'static>(payload: impl Into<QualifierPayload>) -> Self {
    Self::build::<Tag>(payload.into())
  }

  fn build<Tag: 'static>(payload: QualifierPayload) -> Self {
    let tag = TypeId::of::<Tag>();
    let mut hash = 0u64;
    hash_combine(&mut hash, hash_of(&tag));
    hash_combine(&mut hash, hash_of(&payload));
    Qualifier {
      inner: Arc::new(QualInner {
        tag,
        tag_name: std::any::type_name::<Tag>(),
        payload,
        hash,
      }),
    }
  }

  /// The distinguished qualifier that matches any other qualifier.
  pub fn all() -> Self {
    ALL.clone()
  }

  /// The distinguished `Default` sentinel qualifier.
  pub fn default() -> Self {
    DEFAULT.clone()
  }

  /// The distinguished `Null` sentinel qualifier.
  pub fn null() -> Self {
    NULL.clone()
  }

  /// The type key of this qualifier's kind.
  pub fn tag(&self) -> TypeId {
    self.inner.tag
  }

  /// The name of this qualifier's kind, derived from the tag type name
  /// with module paths and any trailing `Tag` suffix removed.
  pub fn name(&self) -> String {
    let short = short_type_name(self.inner.tag_name);
    if let Some(stripped) = short.strip_suffix("Tag") {
      if !stripped.is_empty() {
        return stripped.to_owned();
      }
    }
    short
  }

  /// The payload of this qualifier.
  pub fn payload(&self) -> &QualifierPayload {
    &self.inner.payload
  }

  /// The string payload, if this qualifier carries one.
  pub fn as_str(&self) -> Option<&str> {
    match &self.inner.payload {
      QualifierPayload::Str(s) => Some(s),
      _ => None,
    }
  }

  /// The signed integer payload, if this qualifier carries one.
  pub fn as_int(&self) -> Option<i64> {
    match self.inner.payload {
      QualifierPayload::Int(v) => Some(v),
      _ => None,
    }
  }

  /// The unsigned integer payload, if this qualifier carries one.
  pub fn as_uint(&self) -> Option<u64> {
    match self.inner.payload {
      QualifierPayload::Uint(v) => Some(v),
      _ => None,
    }
  }

  /// The boolean payload, if this qualifier carries one.
  pub fn as_bool(&self) -> Option<bool> {
    match self.inner.payload {
      QualifierPayload::Bool(v) => Some(v),
      _ => None,
    }
  }

  /// The cached hash code of this qualifier.
  pub fn hash_code(&self) -> u64 {
    self.inner.hash
  }

  /// Whether this is the distinguished all-matching qualifier.
  pub fn is_all(&self) -> bool {
    self.inner.tag == TypeId::of::<AllTag>()
  }

  /// Whether `self` and `other` are of the same kind, regardless of
  /// payload.
  pub fn is_similar(&self, other: &Qualifier) -> bool {
    self.inner.tag == other.inner.tag
  }

  /// The matching predicate used by qualifier-set matching: ordinary
  /// equality, except that the all-matching qualifier matches everything.
  pub fn matches(&self, other: &Qualifier) -> bool {
    self.is_all() || self == other
  }
}

impl PartialEq for Qualifier {
  fn eq(&self, other: &Self) -> bool {
    if Arc::ptr_eq(&self.inner, &other.inner) {
      return true;
    }
    self.inner.hash == other.inner.hash
      && self.inner.tag == other.inner.tag
      && self.inner.payload == other.inner.payload
  }
}

impl Eq for Qualifier {}

impl std::hash::Hash for Qualifier {
  fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
    state.write_u64(self.inner.hash);
  }
}

impl fmt::Display for Qualifier {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "@{}", self.name())?;
    if self.inner.payload != QualifierPayload::None {
      write!(f, "({})", self.inner.payload)?;
    }
    Ok(())
  }
}

impl fmt::Debug for Qualifier {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    fmt::Display::fmt(self, f)
  }
}
