//! Resources and resource identities.
//!
//! A [`Resource`] is a typed, scoped, qualified descriptor of a kind of
//! instance the container can materialize. The handle itself holds no
//! instance; it combines a compile-time part (instance type, scope, an
//! optional tag marker) with a run-time part (a [`QualifierSet`]).
//! Constructing a handle does not declare the resource; installing a
//! provider (or an explicit [`Resource::declare`]) does.
//!
//! [`ResourceId`] is the type-erased identity derived from a handle: the
//! pair of the handle's type key and its qualifiers, hash-cached and
//! cheap to clone.

use std::any::TypeId;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use once_cell::unsync::OnceCell;

use crate::container::default_container;
use crate::error::Result;
use crate::internal::{hash_combine, hash_of, short_type_name};
use crate::manager::InjectionList;
use crate::qualifier::QualifierSet;
use crate::scope::{GlobalScope, Scope};

struct RidInner {
  type_key: TypeId,
  type_name: String,
  quals: QualifierSet,
  hash: u64,
}

/// The type-erased identity of a resource: its type key plus its
/// qualifier set, with a cached hash. Cheap to clone and compare.
#[derive(Clone)]
pub struct ResourceId {
  inner: Arc<RidInner>,
}

impl ResourceId {
  /// Build the id for the marker type `R` (a concrete `Resource<..>`
  /// instantiation) with the given qualifiers.
  pub(crate) fn for_resource<R: 'static>(quals: QualifierSet) -> Self {
    let type_key = TypeId::of::<R>();
    let mut hash = 0u64;
    hash_combine(&mut hash, hash_of(&type_key));
    hash_combine(&mut hash, quals.hash_code());
    ResourceId {
      inner: Arc::new(RidInner {
        type_key,
        type_name: short_type_name(std::any::type_name::<R>()),
        quals,
        hash,
      }),
    }
  }

  /// The type key of the resource.
  pub fn type_key(&self) -> TypeId {
    self.inner.type_key
  }

  /// The qualifiers of the resource.
  pub fn qualifiers(&self) -> &QualifierSet {
    &self.inner.quals
  }

  /// The cached hash code.
  pub fn hash_code(&self) -> u64 {
    self.inner.hash
  }
}

impl PartialEq for ResourceId {
  fn eq(&self, other: &Self) -> bool {
    if Arc::ptr_eq(&self.inner, &other.inner) {
      return true;
    }
    self.inner.hash == other.inner.hash
      && self.inner.type_key == other.inner.type_key
      && self.inner.quals == other.inner.quals
  }
}

impl Eq for ResourceId {}

impl std::hash::Hash for ResourceId {
  fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
    state.write_u64(self.inner.hash);
  }
}

impl fmt::Display for ResourceId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "RESOURCE(")?;
    if !self.inner.quals.is_empty() {
      write!(f, "{} ", self.inner.quals)?;
    }
    write!(f, "{})", self.inner.type_name)
  }
}

impl fmt::Debug for ResourceId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    fmt::Display::fmt(self, f)
  }
}

/// A typed resource handle.
///
/// `T` is the instance type the resource materializes to (it must be
/// `Clone`, as instances are handed out by value; use `Rc`/`Arc` for
/// shared object graphs). `S` is the scope policy deciding where
/// instances live and how they are shared. `Tag` is an uninterpreted
/// marker distinguishing otherwise identical resources at the type level;
/// use a tuple to stack several markers.
///
/// Scope and tag are part of the resource's identity: two handles with
/// the same instance type but different scopes or tags are different
/// resources.
///
/// The registration methods on the handle operate on the thread-default
/// container (see [`default_container`]) and chain:
///
/// ```
/// use weft::{Global, QualifierSet};
///
/// let r = Global::<i64>::new(QualifierSet::new());
/// r.provide(|| 41)?.inject(|n| *n += 1);
/// assert_eq!(r.get()?, 42);
/// # weft::default_container().clear()?;
/// # Ok::<(), weft::Error>(())
/// ```
pub struct Resource<T, S = GlobalScope, Tag = ()> {
  quals: QualifierSet,
  id: OnceCell<ResourceId>,
  _marker: PhantomData<fn() -> (T, S, Tag)>,
}

/// Convenience alias for resources in the global scope.
pub type Global<T, Tag = ()> = Resource<T, GlobalScope, Tag>;

impl<T, S, Tag> Clone for Resource<T, S, Tag> {
  fn clone(&self) -> Self {
    Resource {
      quals: self.quals.clone(),
      id: self.id.clone(),
      _marker: PhantomData,
    }
  }
}

impl<T, S, Tag> Resource<T, S, Tag>
where
  T: Clone + 'static,
  S: Scope,
  Tag: 'static,
{
  /// Construct a handle with the given qualifiers.
  pub fn new(quals: QualifierSet) -> Self {
    Resource {
      quals,
      id: OnceCell::new(),
      _marker: PhantomData,
    }
  }

  /// Construct a handle with no qualifiers.
  pub fn unqualified() -> Self {
    Self::new(QualifierSet::new())
  }

  /// The qualifiers of this resource.
  pub fn qualifiers(&self) -> &QualifierSet {
    &self.quals
  }

  /// The type-erased identity of this resource.
  pub fn id(&self) -> ResourceId {
    self
      .id
      .get_or_init(|| ResourceId::for_resource::<Self>(self.quals.clone()))
      .clone()
  }

  /// Ensure a resource manager exists for this resource in the
  /// thread-default container.
  pub fn declare(&self) -> &Self {
    default_container().declare(self);
    self
  }

  /// Install the provider for this resource in the thread-default
  /// container. Fails with [`Error::Configuration`](crate::Error) if a
  /// provider is already set.
  pub fn provide<F>(&self, func: F) -> Result<&Self>
  where
    F: Fn() -> T + 'static,
  {
    default_container().provide(self, func)?;
    Ok(self)
  }

  /// Install the provider with declared dependencies, resolved and passed
  /// to `func` on every invocation.
  pub fn provide_with<D, F>(&self, deps: D, func: F) -> Result<&Self>
  where
    D: InjectionList,
    F: Fn(D::Values) -> T + 'static,
  {
    default_container().provide_with(self, deps, func)?;
    Ok(self)
  }

  /// Append an injector. Injectors run after the provider, in
  /// registration order.
  pub fn inject<F>(&self, func: F) -> &Self
  where
    F: Fn(&mut T) + 'static,
  {
    default_container().inject(self, func);
    self
  }

  /// Append an injector with declared dependencies.
  ///
  /// Declaring dependencies here (rather than resolving them inside the
  /// closure) is what lets the container schedule injections to break
  /// dependency cycles: hidden lookups inside the closure are invisible
  /// to the scheduler and to the consistency checker.
  pub fn inject_with<D, F>(&self, deps: D, func: F) -> &Self
  where
    D: InjectionList,
    F: Fn(&mut T, D::Values) + 'static,
  {
    default_container().inject_with(self, deps, func);
    self
  }

  /// Install the initializer, replacing any previous one. The initializer
  /// runs once, after every injector.
  pub fn initialize<F>(&self, func: F) -> &Self
  where
    F: Fn(&mut T) + 'static,
  {
    default_container().initialize(self, func);
    self
  }

  /// Install the initializer with declared dependencies.
  pub fn initialize_with<D, F>(&self, deps: D, func: F) -> &Self
  where
    D: InjectionList,
    F: Fn(&mut T, D::Values) + 'static,
  {
    default_container().initialize_with(self, deps, func);
    self
  }

  /// Install the disposer, replacing any previous one.
  pub fn dispose<F>(&self, func: F) -> &Self
  where
    F: Fn(&mut T) + 'static,
  {
    default_container().dispose(self, func);
    self
  }

  /// Install the disposer with declared dependencies.
  pub fn dispose_with<D, F>(&self, deps: D, func: F) -> &Self
  where
    D: InjectionList,
    F: Fn(&mut T, D::Values) + 'static,
  {
    default_container().dispose_with(self, deps, func);
    self
  }

  /// Return an instance of this resource from the thread-default
  /// container, materializing it (through the Created phase) if needed.
  pub fn get(&self) -> Result<T> {
    default_container().get(self)
  }
}

impl<T, S, Tag> fmt::Debug for Resource<T, S, Tag>
where
  T: Clone + 'static,
  S: Scope,
  Tag: 'static,
{
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.id())
  }
}
