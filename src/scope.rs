//! Scope policies: where asset slots live, how instances are shared and
//! when they are disposed.
//!
//! A scope maps a resource id to the asset slot it should use. Four
//! policies are provided:
//!
//! - [`GlobalScope`]: one context per container, always active, cleared
//!   only explicitly ([`GlobalScope::clear`] or
//!   [`Container::clear`](crate::Container::clear)).
//! - [`GuardedScope`]: a turnstile-activated context where every live
//!   activation keeps the scope open, and when the last one is dropped
//!   the context is cleared.
//! - [`LocalScope`]: a stack of contexts; each activation pushes a fresh
//!   context and requests go to the top of the stack.
//! - [`NewScope`]: no persistent storage; every request constructs a
//!   fresh instance.
//!
//! Guarded and local scope state lives in the container the activation
//! was entered against, so distinct containers never share instances.
//! Activations entered with `enter()` use the thread-default container.

use std::any::TypeId;
use std::marker::PhantomData;
use std::rc::Rc;

use tracing::error;

use crate::asset::{AssetCell, ContextCell};
use crate::container::{default_container, Container};
use crate::error::{Error, Result};
use crate::internal::short_type_name;
use crate::resource::ResourceId;

/// A scope policy: the mapping from a resource id to the asset slot it
/// should use.
///
/// The operations are associated functions because a scope is a type, not
/// a value; activations (where applicable) are separate RAII guards.
pub trait Scope: 'static {
  /// Whether assets are registered only while their provider runs, and
  /// dropped from the scope immediately after. This preserves the
  /// engine's re-entry cycle check for scopes that never share
  /// instances.
  const TRANSIENT: bool = false;

  /// A human-readable name for error messages.
  fn name() -> String {
    short_type_name(std::any::type_name::<Self>())
  }

  /// Return the asset slot for `rid`, allocating one if needed; the flag
  /// reports whether the slot is new.
  fn get_asset(container: &Container, rid: &ResourceId) -> Result<(AssetCell, bool)>;

  /// Remove the slot for `rid` without disposing it; used to unwind
  /// failed provisioning.
  fn drop_asset(container: &Container, rid: &ResourceId);
}

/// The turnstile count and context stack of one guarded, local or
/// transient scope inside one container.
#[derive(Default)]
pub(crate) struct ScopeState {
  pub(crate) turnstile: usize,
  pub(crate) stack: Vec<ContextCell>,
}

fn active_context(container: &Container, key: TypeId) -> Option<ContextCell> {
  container.with_scope_state(key, |state| {
    if state.turnstile == 0 {
      None
    } else {
      state.stack.last().cloned()
    }
  })
}

/// The always-active scope backed by the container's own context.
///
/// This is the default scope of a [`Resource`](crate::Resource); its
/// context is cleared only explicitly, by [`GlobalScope::clear`] or as
/// part of [`Container::clear`](crate::Container::clear).
#[derive(Debug)]
pub struct GlobalScope;

impl GlobalScope {
  /// Dispose every instance in `container`'s global context, leaving the
  /// declared managers in place. Disposal continues past failures; the
  /// first failure is returned.
  pub fn clear(container: &Container) -> Result<()> {
    let ctx = container.global_context().clone();
    container.clear_context_cell(&ctx)
  }
}

impl Scope for GlobalScope {
  fn name() -> String {
    "GlobalScope".to_owned()
  }

  fn get_asset(container: &Container, rid: &ResourceId) -> Result<(AssetCell, bool)> {
    Ok(container.global_context().borrow_mut().get_or_allocate(rid))
  }

  fn drop_asset(container: &Container, rid: &ResourceId) {
    container.global_context().borrow_mut().remove(rid);
  }
}

/// A scope that never persists instances: every request runs the provider
/// afresh.
///
/// The fresh asset is registered in a transient per-container context
/// only while its provider runs, so a provider that (transitively)
/// requests its own resource is still caught by the engine's cycle
/// check; the entry is discarded as soon as the value is provided.
#[derive(Debug)]
pub struct NewScope;

impl NewScope {
  fn transient_context(container: &Container) -> ContextCell {
    container.with_scope_state(TypeId::of::<NewScope>(), |state| {
      if state.stack.is_empty() {
        let ctx = ContextCell::default();
        state.stack.push(ctx.clone());
        state.turnstile = 1;
        ctx
      } else {
        state.stack[0].clone()
      }
    })
  }
}

impl Scope for NewScope {
  const TRANSIENT: bool = true;

  fn name() -> String {
    "NewScope".to_owned()
  }

  fn get_asset(container: &Container, rid: &ResourceId) -> Result<(AssetCell, bool)> {
    Ok(
      Self::transient_context(container)
        .borrow_mut()
        .get_or_allocate(rid),
    )
  }

  fn drop_asset(container: &Container, rid: &ResourceId) {
    Self::transient_context(container).borrow_mut().remove(rid);
  }
}

/// A turnstile-activated scope.
///
/// `Tag` only serves to mint distinct scopes: each tag type is its own
/// scope with its own context. The scope is active while at least one
/// [`GuardedActivation`] is alive; nested activations share the same
/// context, and dropping the last activation clears it (disposing every
/// instance it holds).
///
/// ```
/// use weft::{GuardedScope, Resource, QualifierSet};
///
/// struct Request;
///
/// let r = Resource::<i64, GuardedScope<Request>>::new(QualifierSet::new());
/// r.provide(|| 7)?;
///
/// assert!(r.get().is_err()); // inactive
/// {
///   let _active = GuardedScope::<Request>::enter();
///   assert_eq!(r.get()?, 7);
/// }
/// assert!(!GuardedScope::<Request>::is_active());
/// # Ok::<(), weft::Error>(())
/// ```
#[derive(Debug)]
pub struct GuardedScope<Tag>(PhantomData<fn() -> Tag>);

impl<Tag: 'static> GuardedScope<Tag> {
  fn key() -> TypeId {
    TypeId::of::<Self>()
  }

  /// Activate this scope against the thread-default container.
  pub fn enter() -> GuardedActivation<Tag> {
    Self::enter_in(&default_container())
  }

  /// Activate this scope in `container`; instances live in that
  /// container, and disposals at deactivation resolve through it.
  pub fn enter_in(container: &Container) -> GuardedActivation<Tag> {
    container.with_scope_state(Self::key(), |state| {
      state.turnstile += 1;
      if state.stack.is_empty() {
        state.stack.push(ContextCell::default());
      }
    });
    GuardedActivation {
      container: container.clone(),
      _marker: PhantomData,
    }
  }

  /// Whether the scope has at least one live activation in the
  /// thread-default container.
  pub fn is_active() -> bool {
    Self::count() > 0
  }

  /// Whether the scope has at least one live activation in `container`.
  pub fn is_active_in(container: &Container) -> bool {
    Self::count_in(container) > 0
  }

  /// The turnstile count in the thread-default container.
  pub fn count() -> usize {
    Self::count_in(&default_container())
  }

  /// The turnstile count in `container`.
  pub fn count_in(container: &Container) -> usize {
    container.with_scope_state(Self::key(), |state| state.turnstile)
  }
}

impl<Tag: 'static> Scope for GuardedScope<Tag> {
  fn get_asset(container: &Container, rid: &ResourceId) -> Result<(AssetCell, bool)> {
    match active_context(container, Self::key()) {
      Some(ctx) => Ok(ctx.borrow_mut().get_or_allocate(rid)),
      None => Err(Error::InactiveScope {
        scope: Self::name(),
        rid: rid.clone(),
      }),
    }
  }

  fn drop_asset(container: &Container, rid: &ResourceId) {
    if let Some(ctx) = active_context(container, Self::key()) {
      ctx.borrow_mut().remove(rid);
    }
  }
}

/// A live activation of a [`GuardedScope`]. Dropping the last activation
/// deactivates the scope and clears its context; disposal failures are
/// logged and swallowed.
#[must_use = "the scope deactivates when the activation is dropped"]
pub struct GuardedActivation<Tag: 'static> {
  container: Container,
  _marker: PhantomData<fn() -> Tag>,
}

impl<Tag: 'static> Drop for GuardedActivation<Tag> {
  fn drop(&mut self) {
    let cleared = self
      .container
      .with_scope_state(GuardedScope::<Tag>::key(), |state| {
        state.turnstile = state.turnstile.saturating_sub(1);
        if state.turnstile == 0 {
          state.stack.pop()
        } else {
          None
        }
      });
    if let Some(ctx) = cleared {
      if let Err(err) = self.container.clear_context_cell(&ctx) {
        error!(
          scope = %GuardedScope::<Tag>::name(),
          error = %err,
          "disposal failed while deactivating scope"
        );
      }
    }
  }
}

/// A scope backed by a stack of contexts.
///
/// Each activation pushes a fresh context; requests go to the top of the
/// stack, so nested activations see distinct instances. Activations must
/// have nested lifetimes (create them as local RAII values).
#[derive(Debug)]
pub struct LocalScope<Tag>(PhantomData<fn() -> Tag>);

impl<Tag: 'static> LocalScope<Tag> {
  fn key() -> TypeId {
    TypeId::of::<Self>()
  }

  /// Activate this scope against the thread-default container.
  pub fn enter() -> LocalActivation<Tag> {
    Self::enter_in(&default_container())
  }

  /// Activate this scope in `container`; instances live in that
  /// container, and disposals at deactivation resolve through it.
  pub fn enter_in(container: &Container) -> LocalActivation<Tag> {
    let ctx = ContextCell::default();
    container.with_scope_state(Self::key(), |state| {
      state.stack.push(ctx.clone());
      state.turnstile = state.stack.len();
    });
    LocalActivation {
      container: container.clone(),
      ctx,
      _marker: PhantomData,
    }
  }

  /// Whether the scope has at least one live activation in the
  /// thread-default container.
  pub fn is_active() -> bool {
    Self::depth() > 0
  }

  /// Whether the scope has at least one live activation in `container`.
  pub fn is_active_in(container: &Container) -> bool {
    Self::depth_in(container) > 0
  }

  /// The number of nested activations in the thread-default container.
  pub fn depth() -> usize {
    Self::depth_in(&default_container())
  }

  /// The number of nested activations in `container`.
  pub fn depth_in(container: &Container) -> usize {
    container.with_scope_state(Self::key(), |state| state.stack.len())
  }
}

impl<Tag: 'static> Scope for LocalScope<Tag> {
  fn get_asset(container: &Container, rid: &ResourceId) -> Result<(AssetCell, bool)> {
    match active_context(container, Self::key()) {
      Some(ctx) => Ok(ctx.borrow_mut().get_or_allocate(rid)),
      None => Err(Error::InactiveScope {
        scope: Self::name(),
        rid: rid.clone(),
      }),
    }
  }

  fn drop_asset(container: &Container, rid: &ResourceId) {
    if let Some(ctx) = active_context(container, Self::key()) {
      ctx.borrow_mut().remove(rid);
    }
  }
}

/// A live activation of a [`LocalScope`]. Dropping it pops the context it
/// pushed and disposes every instance in it; disposal failures are logged
/// and swallowed.
#[must_use = "the scope deactivates when the activation is dropped"]
pub struct LocalActivation<Tag: 'static> {
  container: Container,
  ctx: ContextCell,
  _marker: PhantomData<fn() -> Tag>,
}

impl<Tag: 'static> Drop for LocalActivation<Tag> {
  fn drop(&mut self) {
    let popped = self
      .container
      .with_scope_state(LocalScope::<Tag>::key(), |state| {
        let popped = state.stack.pop();
        state.turnstile = state.stack.len();
        popped
      });
    if let Some(ctx) = popped {
      // Activations are expected to nest; the context we pop must be the
      // one we pushed.
      debug_assert!(Rc::ptr_eq(&ctx, &self.ctx));
      if let Err(err) = self.container.clear_context_cell(&ctx) {
        error!(
          scope = %LocalScope::<Tag>::name(),
          error = %err,
          "disposal failed while deactivating scope"
        );
      }
    }
  }
}
