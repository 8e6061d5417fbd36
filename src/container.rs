//! The container: registry of resource managers, owner of the global
//! context, and home of the instantiation engine.
//!
//! A [`Container`] is a cheap-clone handle; clones share one registry,
//! one global context and one pair of deferred-work queues. A per-thread
//! default container backs the convenience methods on
//! [`Resource`](crate::Resource) and the scope activations; see
//! [`default_container`].
//!
//! # The instantiation engine
//!
//! A request for an instance asks the resource's scope for an asset slot.
//! A new slot is driven through its phases: the provider runs first (its
//! declared dependencies are resolved recursively, to their Provided
//! phase), then the remaining work (injection, then initialization) is
//! *deferred* onto two queues that are drained while the requested asset
//! has not reached the requested phase.
//!
//! Deferral is what makes cyclically-dependent resources constructible:
//! a dependency declared on an injector only needs its target *provided*,
//! not fully wired, so provider-time and injection-time work for
//! different resources can interleave. A cycle in which every edge is a
//! provider dependency has no such interleaving; the engine detects the
//! re-entry (the asset is still Allocated) and fails with a
//! cyclical-dependency error.

use std::any::TypeId;
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::rc::Rc;

use tracing::{debug, trace, warn};

use crate::asset::{AssetCell, Context, ContextCell, Phase};
use crate::checker;
use crate::error::{Error, Result};
use crate::manager::{InjectionList, ResourceManager, TypedManager};
use crate::resource::{Resource, ResourceId};
use crate::scope::{Scope, ScopeState};

// A unit of deferred lifecycle work: finish injecting, or initialize.
struct Deferred {
  rid: ResourceId,
  cell: AssetCell,
  manager: Rc<dyn ResourceManager>,
}

pub(crate) struct ContainerState {
  managers: RefCell<HashMap<ResourceId, Rc<dyn ResourceManager>>>,
  global_context: ContextCell,
  scopes: RefCell<HashMap<TypeId, ScopeState>>,
  inject_queue: RefCell<VecDeque<Deferred>>,
  create_queue: RefCell<VecDeque<Deferred>>,
}

/// The holder of all resource-related state: manager registry, global
/// context and the engine's deferred-work queues.
///
/// `Container` is a handle; cloning it is cheap and clones share state.
/// The container is single-logical-task: it is neither `Send` nor `Sync`,
/// and each thread's [`default_container`] is its own isolated instance.
#[derive(Clone)]
pub struct Container {
  state: Rc<ContainerState>,
}

impl Default for Container {
  fn default() -> Self {
    Self::new()
  }
}

thread_local! {
  static DEFAULT_CONTAINER: Container = Container::new();
}

/// The thread-default container used by the convenience methods on
/// [`Resource`](crate::Resource) and by scope activations entered without
/// an explicit container.
pub fn default_container() -> Container {
  DEFAULT_CONTAINER.with(Clone::clone)
}

impl Container {
  /// Create a new, empty container.
  pub fn new() -> Self {
    Container {
      state: Rc::new(ContainerState {
        managers: RefCell::new(HashMap::new()),
        global_context: Rc::new(RefCell::new(Context::new())),
        scopes: RefCell::new(HashMap::new()),
        inject_queue: RefCell::new(VecDeque::new()),
        create_queue: RefCell::new(VecDeque::new()),
      }),
    }
  }

  pub(crate) fn global_context(&self) -> &ContextCell {
    &self.state.global_context
  }

  /// Run `f` against the scope state stored under `key`, creating an
  /// empty state if none exists. The store borrow is released before `f`'s
  /// result is returned, so callers may re-enter the container afterwards.
  pub(crate) fn with_scope_state<R>(&self, key: TypeId, f: impl FnOnce(&mut ScopeState) -> R) -> R {
    let mut scopes = self.state.scopes.borrow_mut();
    f(scopes.entry(key).or_default())
  }

  /// Ensure a manager exists for `r`, creating one if needed, and return
  /// it. Declaring is idempotent: the same resource always maps to the
  /// same manager until [`clear`](Container::clear).
  pub fn declare<T, S, Tag>(&self, r: &Resource<T, S, Tag>) -> Rc<dyn ResourceManager>
  where
    T: Clone + 'static,
    S: Scope,
    Tag: 'static,
  {
    let rid = r.id();
    let mut managers = self.state.managers.borrow_mut();
    managers
      .entry(rid.clone())
      .or_insert_with(|| {
        debug!(resource = %rid, "declared resource manager");
        Rc::new(TypedManager::<T>::new(rid.clone()))
      })
      .clone()
  }

  /// Return the manager for `r` if one has been declared; does not
  /// create one.
  pub fn get_declared<T, S, Tag>(&self, r: &Resource<T, S, Tag>) -> Option<Rc<dyn ResourceManager>>
  where
    T: Clone + 'static,
    S: Scope,
    Tag: 'static,
  {
    self.state.managers.borrow().get(&r.id()).cloned()
  }

  /// Whether `r` has a declared manager.
  pub fn is_declared<T, S, Tag>(&self, r: &Resource<T, S, Tag>) -> bool
  where
    T: Clone + 'static,
    S: Scope,
    Tag: 'static,
  {
    self.state.managers.borrow().contains_key(&r.id())
  }

  /// The number of declared resource managers.
  pub fn manager_count(&self) -> usize {
    self.state.managers.borrow().len()
  }

  pub(crate) fn managers_snapshot(&self) -> Vec<(ResourceId, Rc<dyn ResourceManager>)> {
    self
      .state
      .managers
      .borrow()
      .iter()
      .map(|(rid, mgr)| (rid.clone(), mgr.clone()))
      .collect()
  }

  fn lookup(&self, rid: &ResourceId) -> Option<Rc<dyn ResourceManager>> {
    self.state.managers.borrow().get(rid).cloned()
  }

  fn with_typed<T, S, Tag, R>(
    &self,
    r: &Resource<T, S, Tag>,
    f: impl FnOnce(&TypedManager<T>) -> R,
  ) -> R
  where
    T: Clone + 'static,
    S: Scope,
    Tag: 'static,
  {
    let manager = self.declare(r);
    let typed = manager
      .as_any()
      .downcast_ref::<TypedManager<T>>()
      .expect("resource manager stored under a mismatched type key");
    f(typed)
  }

  // --- Lifecycle registration ---

  /// Install the provider for `r`. Fails with
  /// [`Error::Configuration`] if a provider is already set.
  pub fn provide<T, S, Tag, F>(&self, r: &Resource<T, S, Tag>, func: F) -> Result<()>
  where
    T: Clone + 'static,
    S: Scope,
    Tag: 'static,
    F: Fn() -> T + 'static,
  {
    self.provide_with(r, (), move |_: ()| func())
  }

  /// Install the provider for `r` with declared dependencies. Each
  /// dependency is resolved to its Provided phase and the tuple of values
  /// is passed to `func` on every invocation. Other arguments a provider
  /// needs are simply captured by the closure.
  pub fn provide_with<T, S, Tag, D, F>(&self, r: &Resource<T, S, Tag>, deps: D, func: F) -> Result<()>
  where
    T: Clone + 'static,
    S: Scope,
    Tag: 'static,
    D: InjectionList,
    F: Fn(D::Values) -> T + 'static,
  {
    deps.declare_all(self);
    self.with_typed(r, |m| m.set_provider(deps, func))
  }

  /// Append an injector for `r`. Injectors run after the provider, in
  /// registration order.
  pub fn inject<T, S, Tag, F>(&self, r: &Resource<T, S, Tag>, func: F)
  where
    T: Clone + 'static,
    S: Scope,
    Tag: 'static,
    F: Fn(&mut T) + 'static,
  {
    self.inject_with(r, (), move |value, _: ()| func(value));
  }

  /// Append an injector for `r` with declared dependencies, resolved to
  /// their Provided phase, which is what lets the engine interleave
  /// injections to break dependency cycles.
  pub fn inject_with<T, S, Tag, D, F>(&self, r: &Resource<T, S, Tag>, deps: D, func: F)
  where
    T: Clone + 'static,
    S: Scope,
    Tag: 'static,
    D: InjectionList,
    F: Fn(&mut T, D::Values) + 'static,
  {
    deps.declare_all(self);
    self.with_typed(r, |m| m.add_injector(deps, func));
  }

  /// Install the initializer for `r`, replacing any previous one.
  pub fn initialize<T, S, Tag, F>(&self, r: &Resource<T, S, Tag>, func: F)
  where
    T: Clone + 'static,
    S: Scope,
    Tag: 'static,
    F: Fn(&mut T) + 'static,
  {
    self.initialize_with(r, (), move |value, _: ()| func(value));
  }

  /// Install the initializer for `r` with declared dependencies, resolved
  /// to their Injected phase.
  pub fn initialize_with<T, S, Tag, D, F>(&self, r: &Resource<T, S, Tag>, deps: D, func: F)
  where
    T: Clone + 'static,
    S: Scope,
    Tag: 'static,
    D: InjectionList,
    F: Fn(&mut T, D::Values) + 'static,
  {
    deps.declare_all(self);
    self.with_typed(r, |m| m.set_initializer(deps, func));
  }

  /// Install the disposer for `r`, replacing any previous one. The
  /// disposer receives the stored value by mutable reference when the
  /// enclosing context is cleared.
  pub fn dispose<T, S, Tag, F>(&self, r: &Resource<T, S, Tag>, func: F)
  where
    T: Clone + 'static,
    S: Scope,
    Tag: 'static,
    F: Fn(&mut T) + 'static,
  {
    self.dispose_with(r, (), move |value, _: ()| func(value));
  }

  /// Install the disposer for `r` with declared dependencies, resolved to
  /// their Created phase.
  pub fn dispose_with<T, S, Tag, D, F>(&self, r: &Resource<T, S, Tag>, deps: D, func: F)
  where
    T: Clone + 'static,
    S: Scope,
    Tag: 'static,
    D: InjectionList,
    F: Fn(&mut T, D::Values) + 'static,
  {
    deps.declare_all(self);
    self.with_typed(r, |m| m.set_disposer(deps, func));
  }

  // --- Instantiation ---

  /// Return an instance of `r`, materializing it (through the Created
  /// phase) if its scope does not already hold one.
  pub fn get<T, S, Tag>(&self, r: &Resource<T, S, Tag>) -> Result<T>
  where
    T: Clone + 'static,
    S: Scope,
    Tag: 'static,
  {
    self.get_at(r, Phase::Created)
  }

  /// Run `r`'s provider directly and return the produced value without
  /// storing it in any scope.
  pub fn provide_value<T, S, Tag>(&self, r: &Resource<T, S, Tag>) -> Result<T>
  where
    T: Clone + 'static,
    S: Scope,
    Tag: 'static,
  {
    self.with_typed(r, |m| m.provide_value(self))
  }

  /// The engine entry point: drive `r`'s asset to at least `target` and
  /// return its value.
  pub(crate) fn get_at<T, S, Tag>(&self, r: &Resource<T, S, Tag>, target: Phase) -> Result<T>
  where
    T: Clone + 'static,
    S: Scope,
    Tag: 'static,
  {
    let rid = r.id();
    let (cell, is_new) = S::get_asset(self, &rid)?;

    if is_new {
      let manager = match self.lookup(&rid) {
        Some(manager) => manager,
        None => {
          S::drop_asset(self, &rid);
          return Err(Error::Instantiation {
            rid,
            message: "undeclared resource".to_owned(),
            cause: None,
          });
        }
      };

      // The provider's dependencies resolve through recursive requests;
      // the asset stays Allocated while they do, which is what the
      // re-entry check below observes for provider-only cycles.
      if let Err(cause) = manager.provide_into(self, &cell) {
        S::drop_asset(self, &rid);
        return Err(Error::Instantiation {
          rid,
          message: "provisioning failed".to_owned(),
          cause: Some(Box::new(cause)),
        });
      }

      {
        let mut asset = cell.borrow_mut();
        asset.set_manager(manager.clone());
        asset.set_phase(Phase::Provided);
      }
      trace!(resource = %rid, "provided");

      if S::TRANSIENT {
        S::drop_asset(self, &rid);
      }

      // Defer the remaining work for this asset.
      if manager.injector_count() > 0 {
        self.state.inject_queue.borrow_mut().push_back(Deferred {
          rid: rid.clone(),
          cell: cell.clone(),
          manager,
        });
      } else {
        cell.borrow_mut().set_phase(Phase::Injected);
        if manager.has_initializer() {
          self.state.create_queue.borrow_mut().push_back(Deferred {
            rid: rid.clone(),
            cell: cell.clone(),
            manager,
          });
        } else {
          cell.borrow_mut().set_phase(Phase::Created);
        }
      }
    } else if cell.borrow().phase() == Phase::Allocated {
      // Re-entering a resource that is currently being provisioned from
      // within its own provider chain: no injector can break this cycle.
      return Err(Error::Instantiation {
        rid,
        message: "cyclical dependency".to_owned(),
        cause: None,
      });
    }

    while cell.borrow().phase() < target {
      if !self.drain_one()? {
        return Err(Error::Instantiation {
          rid,
          message: "cyclical dependency".to_owned(),
          cause: None,
        });
      }
    }

    let asset = cell.borrow();
    asset.get_cloned::<T>(&rid)
  }

  /// Drain one unit of deferred work, preferring creation work so that
  /// fully-injected assets finish before newly-injected ones pile up
  /// unfinalized. Returns whether any work was done.
  fn drain_one(&self) -> Result<bool> {
    let item = self.state.create_queue.borrow_mut().pop_front();
    if let Some(deferred) = item {
      trace!(resource = %deferred.rid, "running deferred initializer");
      deferred
        .manager
        .initialize(self, &deferred.cell)
        .map_err(|cause| Error::Instantiation {
          rid: deferred.rid.clone(),
          message: "the initializer failed".to_owned(),
          cause: Some(Box::new(cause)),
        })?;
      deferred.cell.borrow_mut().set_phase(Phase::Created);
      return Ok(true);
    }

    let item = self.state.inject_queue.borrow_mut().pop_front();
    if let Some(deferred) = item {
      trace!(resource = %deferred.rid, "running deferred injectors");
      deferred
        .manager
        .inject(self, &deferred.cell)
        .map_err(|cause| Error::Instantiation {
          rid: deferred.rid.clone(),
          message: "injection failed".to_owned(),
          cause: Some(Box::new(cause)),
        })?;
      deferred.cell.borrow_mut().set_phase(Phase::Injected);
      if deferred.manager.has_initializer() {
        self.state.create_queue.borrow_mut().push_back(deferred);
      } else {
        deferred.cell.borrow_mut().set_phase(Phase::Created);
      }
      return Ok(true);
    }

    Ok(false)
  }

  // --- Maintenance ---

  /// Dispose every asset in the global context and in every scope's
  /// contexts (each exactly once, continuing past failures), then drop
  /// every manager and any pending deferred work. Live scope activations
  /// stay valid; their contexts are simply empty afterwards. The first
  /// disposal failure, if any, is returned.
  pub fn clear(&self) -> Result<()> {
    debug!("clearing container");
    let mut first_err: Option<Error> = None;

    let global = self.state.global_context.clone();
    if let Err(err) = self.clear_context_cell(&global) {
      first_err = Some(err);
    }

    let scope_contexts: Vec<ContextCell> = self
      .state
      .scopes
      .borrow()
      .values()
      .flat_map(|state| state.stack.iter().cloned())
      .collect();
    for ctx in scope_contexts {
      if let Err(err) = self.clear_context_cell(&ctx) {
        first_err.get_or_insert(err);
      }
    }

    self.state.managers.borrow_mut().clear();
    self.state.inject_queue.borrow_mut().clear();
    self.state.create_queue.borrow_mut().clear();
    match first_err {
      None => Ok(()),
      Some(err) => Err(err),
    }
  }

  /// Dispose every entry of a context, exactly once per entry, then
  /// clear the map.
  ///
  /// Entries stay in the map while the disposers run, so a disposer that
  /// re-resolves a sibling resource from the same context is handed the
  /// live instance rather than a freshly provisioned one; each pass
  /// removes its entries only after all of them are disposed. Disposal
  /// continues past failures, and entries allocated by disposers while
  /// the clear runs are disposed as well.
  pub(crate) fn clear_context_cell(&self, ctx: &ContextCell) -> Result<()> {
    let mut first_err: Option<Error> = None;
    loop {
      let entries = ctx.borrow().entries_snapshot();
      if entries.is_empty() {
        break;
      }
      for (rid, cell) in &entries {
        // A nested clear may have disposed this entry already.
        let live = ctx.borrow().holds(rid, cell) && cell.borrow().phase() != Phase::Disposed;
        if !live {
          continue;
        }
        if let Err(err) = self.dispose_entry(rid, cell) {
          warn!(resource = %rid, error = %err, "disposal failed; continuing with remaining assets");
          if first_err.is_none() {
            first_err = Some(err);
          }
        }
      }
      for (rid, cell) in &entries {
        ctx.borrow_mut().remove_exact(rid, cell);
      }
    }
    match first_err {
      None => Ok(()),
      Some(err) => Err(err),
    }
  }

  fn dispose_entry(&self, rid: &ResourceId, cell: &AssetCell) -> Result<()> {
    let manager = cell.borrow().manager();
    match manager {
      Some(manager) => manager.dispose(self, cell),
      None if cell.borrow().has_value() => Err(Error::Disposal {
        rid: rid.clone(),
        message: "could not locate a resource manager for the stored value".to_owned(),
        cause: None,
      }),
      // Never provided: nothing to dispose.
      None => Ok(()),
    }
  }

  /// Check the declared configuration for consistency: build the phase
  /// event graph and verify it has a valid topological order, that every
  /// declared dependency has a manager, and that every manager has a
  /// provider. Writes a human-readable report to `sink` and returns the
  /// verdict; never errors.
  pub fn check_consistency(&self, sink: &mut dyn fmt::Write) -> bool {
    checker::check(self, sink)
  }
}

impl fmt::Debug for Container {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Container")
      .field("managers", &self.state.managers.borrow().len())
      .field("global_assets", &self.state.global_context.borrow().len())
      .finish()
  }
}
