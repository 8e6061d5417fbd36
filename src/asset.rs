//! Storage for instances inside contexts: lifecycle phases, assets and
//! the context maps that back scopes.

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::manager::ResourceManager;
use crate::resource::ResourceId;

/// The lifecycle phase of an asset.
///
/// Phases are totally ordered and an asset's phase never decreases during
/// its lifetime; `Disposed` terminates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
  /// Storage has been obtained; no value yet.
  Allocated,
  /// The provider has produced a value.
  Provided,
  /// Every injector has run.
  Injected,
  /// The initializer has run; the instance is ready for use.
  Created,
  /// The disposer has run; the instance is dead.
  Disposed,
}

impl Phase {
  /// A lowercase human-readable name, as used in consistency reports.
  pub fn name(self) -> &'static str {
    match self {
      Phase::Allocated => "allocated",
      Phase::Provided => "provided",
      Phase::Injected => "injected",
      Phase::Created => "created",
      Phase::Disposed => "disposed",
    }
  }
}

impl fmt::Display for Phase {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

/// One storage slot for one instance inside a context: a type-erased
/// value plus its current [`Phase`].
///
/// Once a value is provided, the asset also keeps a handle to the
/// resource's manager so the context can dispose the instance without a
/// registry lookup.
pub struct Asset {
  value: Option<Box<dyn Any>>,
  phase: Phase,
  manager: Option<Rc<dyn ResourceManager>>,
}

/// The shared cell an asset lives in.
///
/// Slots are handed out as cells so that the engine never holds a context
/// borrow across a user callback.
pub type AssetCell = Rc<RefCell<Asset>>;

impl Asset {
  pub(crate) fn new() -> Self {
    Asset {
      value: None,
      phase: Phase::Allocated,
      manager: None,
    }
  }

  /// The current phase of this asset.
  pub fn phase(&self) -> Phase {
    self.phase
  }

  /// Whether a value has been provided.
  pub fn has_value(&self) -> bool {
    self.value.is_some()
  }

  pub(crate) fn set_phase(&mut self, phase: Phase) {
    debug_assert!(phase >= self.phase, "asset phase must not decrease");
    self.phase = phase;
  }

  pub(crate) fn set_value(&mut self, value: Box<dyn Any>) {
    self.value = Some(value);
  }

  pub(crate) fn set_manager(&mut self, manager: Rc<dyn ResourceManager>) {
    self.manager = Some(manager);
  }

  pub(crate) fn manager(&self) -> Option<Rc<dyn ResourceManager>> {
    self.manager.clone()
  }

  /// Clone the stored value out at type `T`.
  pub(crate) fn get_cloned<T: Clone + 'static>(&self, rid: &ResourceId) -> Result<T> {
    self
      .value
      .as_deref()
      .and_then(|v| v.downcast_ref::<T>())
      .cloned()
      .ok_or_else(|| Error::TypeMismatch {
        rid: rid.clone(),
        expected: std::any::type_name::<T>(),
      })
  }

  /// Borrow the stored value mutably at type `T`.
  pub(crate) fn value_mut<T: 'static>(&mut self, rid: &ResourceId) -> Result<&mut T> {
    self
      .value
      .as_deref_mut()
      .and_then(|v| v.downcast_mut::<T>())
      .ok_or_else(|| Error::TypeMismatch {
        rid: rid.clone(),
        expected: std::any::type_name::<T>(),
      })
  }
}

impl fmt::Debug for Asset {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Asset")
      .field("phase", &self.phase)
      .field("has_value", &self.value.is_some())
      .finish()
  }
}

/// The backing map of a scope: resource id to asset cell.
///
/// Clearing a context is driven from the container side: entries stay in
/// the map while their disposers run (so a disposer may re-resolve a
/// sibling resource and be handed the live instance) and are removed only
/// once disposed.
#[derive(Default)]
pub(crate) struct Context {
  assets: HashMap<ResourceId, AssetCell>,
}

/// The shared cell a context lives in.
pub(crate) type ContextCell = Rc<RefCell<Context>>;

impl Context {
  pub(crate) fn new() -> Self {
    Self::default()
  }

  /// Ensure an entry exists for `rid`; the flag reports whether it was
  /// newly created.
  pub(crate) fn get_or_allocate(&mut self, rid: &ResourceId) -> (AssetCell, bool) {
    match self.assets.get(rid) {
      Some(cell) => (cell.clone(), false),
      None => {
        let cell: AssetCell = Rc::new(RefCell::new(Asset::new()));
        self.assets.insert(rid.clone(), cell.clone());
        (cell, true)
      }
    }
  }

  /// Remove an entry without disposing it; used to unwind failed
  /// provisioning.
  pub(crate) fn remove(&mut self, rid: &ResourceId) {
    self.assets.remove(rid);
  }

  /// Snapshot every entry without removing any.
  pub(crate) fn entries_snapshot(&self) -> Vec<(ResourceId, AssetCell)> {
    self
      .assets
      .iter()
      .map(|(rid, cell)| (rid.clone(), cell.clone()))
      .collect()
  }

  /// Whether `rid` still maps to exactly `cell`.
  pub(crate) fn holds(&self, rid: &ResourceId, cell: &AssetCell) -> bool {
    self
      .assets
      .get(rid)
      .map_or(false, |current| Rc::ptr_eq(current, cell))
  }

  /// Remove the entry for `rid` if it still maps to exactly `cell`.
  pub(crate) fn remove_exact(&mut self, rid: &ResourceId, cell: &AssetCell) {
    if self.holds(rid, cell) {
      self.assets.remove(rid);
    }
  }

  pub(crate) fn len(&self) -> usize {
    self.assets.len()
  }
}
