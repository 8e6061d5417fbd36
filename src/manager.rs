//! Per-resource lifecycle managers.
//!
//! A resource manager holds the provider, the ordered injectors, the
//! optional initializer and the optional disposer registered for one
//! resource, together with each callback's *injection list*: the declared
//! dependencies that must be resolved and passed as arguments when the
//! callback runs.
//!
//! The container stores managers behind the type-erased
//! [`ResourceManager`] trait; the typed implementation knows the concrete
//! instance type and performs the single downcast at entry.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use crate::asset::{AssetCell, Phase};
use crate::container::Container;
use crate::error::{Error, Result};
use crate::resource::{Resource, ResourceId};
use crate::scope::Scope;

/// One declared dependency of a lifecycle callback: the resource and the
/// minimum phase its instance must have reached when the callback runs.
#[derive(Clone, Debug)]
pub struct DepSpec {
  /// The resource depended upon.
  pub rid: ResourceId,
  /// The minimum phase the dependency is resolved to.
  pub phase: Phase,
}

/// A value that can appear in an injection list.
///
/// Implemented by [`Resource`] handles; resolving fetches the instance
/// through the container at the requested minimum phase.
pub trait Dependency: Clone + 'static {
  /// The instance type this dependency resolves to.
  type Value;

  /// The identity of the resource depended upon.
  fn dep_id(&self) -> ResourceId;

  /// Ensure the dependency has a manager in `container`.
  fn declare_dep(&self, container: &Container);

  /// Resolve the dependency to its instance.
  fn fetch(&self, container: &Container, phase: Phase) -> Result<Self::Value>;
}

impl<T, S, Tag> Dependency for Resource<T, S, Tag>
where
  T: Clone + 'static,
  S: Scope,
  Tag: 'static,
{
  type Value = T;

  fn dep_id(&self) -> ResourceId {
    self.id()
  }

  fn declare_dep(&self, container: &Container) {
    container.declare(self);
  }

  fn fetch(&self, container: &Container, phase: Phase) -> Result<T> {
    container.get_at(self, phase)
  }
}

/// An ordered list of declared dependencies: the unit for none, or a
/// tuple of up to four resource handles.
///
/// Registering a callback with an injection list records the dependencies
/// (they become visible to the consistency checker and the scheduler) and
/// resolves them to a tuple of instance values on every invocation.
pub trait InjectionList: 'static {
  /// The tuple of resolved instance values.
  type Values;

  /// The dependency specs, at the given minimum phase.
  fn specs(&self, phase: Phase) -> Vec<DepSpec>;

  /// Ensure every dependency has a manager in `container`.
  fn declare_all(&self, container: &Container);

  /// Resolve every dependency, in order.
  fn resolve(&self, container: &Container, phase: Phase) -> Result<Self::Values>;
}

impl InjectionList for () {
  type Values = ();

  fn specs(&self, _phase: Phase) -> Vec<DepSpec> {
    Vec::new()
  }

  fn declare_all(&self, _container: &Container) {}

  fn resolve(&self, _container: &Container, _phase: Phase) -> Result<()> {
    Ok(())
  }
}

macro_rules! impl_injection_list {
  ($(($($dep:ident . $idx:tt),+)),+ $(,)?) => {
    $(
      impl<$($dep: Dependency),+> InjectionList for ($($dep,)+) {
        type Values = ($($dep::Value,)+);

        fn specs(&self, phase: Phase) -> Vec<DepSpec> {
          vec![$(DepSpec { rid: self.$idx.dep_id(), phase }),+]
        }

        fn declare_all(&self, container: &Container) {
          $(self.$idx.declare_dep(container);)+
        }

        fn resolve(&self, container: &Container, phase: Phase) -> Result<Self::Values> {
          Ok(($(self.$idx.fetch(container, phase)?,)+))
        }
      }
    )+
  };
}

impl_injection_list!(
  (A.0),
  (A.0, B.1),
  (A.0, B.1, C.2),
  (A.0, B.1, C.2, D.3),
);

/// The type-erased management interface of one resource.
///
/// Introspection reports the registered callbacks and their injection
/// lists; the lifecycle entry points drive a single asset cell through
/// its phases. Managers are obtained from
/// [`Container::declare`](crate::Container::declare) or
/// [`Container::get_declared`](crate::Container::get_declared).
pub trait ResourceManager {
  /// The resource this manager manages.
  fn rid(&self) -> &ResourceId;

  /// Whether a provider has been set.
  fn has_provider(&self) -> bool;

  /// Whether an initializer has been set.
  fn has_initializer(&self) -> bool;

  /// Whether a disposer has been set.
  fn has_disposer(&self) -> bool;

  /// The provider's injection list.
  fn provider_injections(&self) -> Vec<DepSpec>;

  /// The initializer's injection list.
  fn initializer_injections(&self) -> Vec<DepSpec>;

  /// The disposer's injection list.
  fn disposer_injections(&self) -> Vec<DepSpec>;

  /// The number of registered injectors.
  fn injector_count(&self) -> usize;

  /// The injection list of the injector at `index`.
  fn injector_injections(&self, index: usize) -> Vec<DepSpec>;

  /// Run the provider and store the produced value in the cell. Fails
  /// with [`Error::Instantiation`] if no provider is set.
  fn provide_into(&self, container: &Container, cell: &AssetCell) -> Result<()>;

  /// Run every injector, in registration order. No injectors is a no-op.
  fn inject(&self, container: &Container, cell: &AssetCell) -> Result<()>;

  /// Run the initializer, if set.
  fn initialize(&self, container: &Container, cell: &AssetCell) -> Result<()>;

  /// Run the disposer, if set, and mark the asset disposed.
  fn dispose(&self, container: &Container, cell: &AssetCell) -> Result<()>;

  /// Downcast support for the typed registration layer.
  fn as_any(&self) -> &dyn Any;
}

type ProviderFn<T> = dyn Fn(&Container) -> Result<T>;
type StageFn = dyn Fn(&Container, &AssetCell) -> Result<()>;

struct CallRec<F: ?Sized> {
  func: Rc<F>,
  deps: Vec<DepSpec>,
}

struct ManagerInner<T> {
  provider: Option<CallRec<ProviderFn<T>>>,
  injectors: Vec<CallRec<StageFn>>,
  initializer: Option<CallRec<StageFn>>,
  disposer: Option<CallRec<StageFn>>,
}

impl<T> Default for ManagerInner<T> {
  fn default() -> Self {
    ManagerInner {
      provider: None,
      injectors: Vec::new(),
      initializer: None,
      disposer: None,
    }
  }
}

/// The typed manager implementation for instance type `T`.
///
/// Callbacks are stored as `Rc<dyn Fn>` records and snapshotted before
/// invocation, so user code may register further callbacks re-entrantly.
/// Stage closures resolve their declared dependencies *before* borrowing
/// the asset cell, so a dependency on the resource being injected never
/// aliases the cell borrow.
pub(crate) struct TypedManager<T: Clone + 'static> {
  rid: ResourceId,
  inner: RefCell<ManagerInner<T>>,
}

impl<T: Clone + 'static> TypedManager<T> {
  pub(crate) fn new(rid: ResourceId) -> Self {
    TypedManager {
      rid,
      inner: RefCell::new(ManagerInner::default()),
    }
  }

  pub(crate) fn set_provider<D, F>(&self, deps: D, func: F) -> Result<()>
  where
    D: InjectionList,
    F: Fn(D::Values) -> T + 'static,
  {
    let mut inner = self.inner.borrow_mut();
    if inner.provider.is_some() {
      return Err(Error::Configuration {
        rid: self.rid.clone(),
        message: "a provider is already set".to_owned(),
      });
    }
    let specs = deps.specs(Phase::Provided);
    let run: Rc<ProviderFn<T>> = Rc::new(move |container: &Container| {
      let values = deps.resolve(container, Phase::Provided)?;
      Ok(func(values))
    });
    inner.provider = Some(CallRec {
      func: run,
      deps: specs,
    });
    Ok(())
  }

  pub(crate) fn add_injector<D, F>(&self, deps: D, func: F)
  where
    D: InjectionList,
    F: Fn(&mut T, D::Values) + 'static,
  {
    let specs = deps.specs(Phase::Provided);
    let rid = self.rid.clone();
    let run: Rc<StageFn> = Rc::new(move |container: &Container, cell: &AssetCell| {
      let values = deps.resolve(container, Phase::Provided)?;
      let mut asset = cell.borrow_mut();
      let value = asset.value_mut::<T>(&rid)?;
      func(value, values);
      Ok(())
    });
    self.inner.borrow_mut().injectors.push(CallRec {
      func: run,
      deps: specs,
    });
  }

  pub(crate) fn set_initializer<D, F>(&self, deps: D, func: F)
  where
    D: InjectionList,
    F: Fn(&mut T, D::Values) + 'static,
  {
    let specs = deps.specs(Phase::Injected);
    let rid = self.rid.clone();
    let run: Rc<StageFn> = Rc::new(move |container: &Container, cell: &AssetCell| {
      let values = deps.resolve(container, Phase::Injected)?;
      let mut asset = cell.borrow_mut();
      let value = asset.value_mut::<T>(&rid)?;
      func(value, values);
      Ok(())
    });
    // Replacing an existing initializer is not an error.
    self.inner.borrow_mut().initializer = Some(CallRec {
      func: run,
      deps: specs,
    });
  }

  pub(crate) fn set_disposer<D, F>(&self, deps: D, func: F)
  where
    D: InjectionList,
    F: Fn(&mut T, D::Values) + 'static,
  {
    let specs = deps.specs(Phase::Created);
    let rid = self.rid.clone();
    let run: Rc<StageFn> = Rc::new(move |container: &Container, cell: &AssetCell| {
      let values = deps.resolve(container, Phase::Created)?;
      let mut asset = cell.borrow_mut();
      let value = asset.value_mut::<T>(&rid)?;
      func(value, values);
      Ok(())
    });
    self.inner.borrow_mut().disposer = Some(CallRec {
      func: run,
      deps: specs,
    });
  }

  /// Run the provider and return the produced value without storing it.
  pub(crate) fn provide_value(&self, container: &Container) -> Result<T> {
    let run = self.inner.borrow().provider.as_ref().map(|rec| rec.func.clone());
    match run {
      Some(func) => func(container),
      None => Err(Error::Instantiation {
        rid: self.rid.clone(),
        message: "a provider is not set".to_owned(),
        cause: None,
      }),
    }
  }
}

impl<T: Clone + 'static> ResourceManager for TypedManager<T> {
  fn rid(&self) -> &ResourceId {
    &self.rid
  }

  fn has_provider(&self) -> bool {
    self.inner.borrow().provider.is_some()
  }

  fn has_initializer(&self) -> bool {
    self.inner.borrow().initializer.is_some()
  }

  fn has_disposer(&self) -> bool {
    self.inner.borrow().disposer.is_some()
  }

  fn provider_injections(&self) -> Vec<DepSpec> {
    self
      .inner
      .borrow()
      .provider
      .as_ref()
      .map(|rec| rec.deps.clone())
      .unwrap_or_default()
  }

  fn initializer_injections(&self) -> Vec<DepSpec> {
    self
      .inner
      .borrow()
      .initializer
      .as_ref()
      .map(|rec| rec.deps.clone())
      .unwrap_or_default()
  }

  fn disposer_injections(&self) -> Vec<DepSpec> {
    self
      .inner
      .borrow()
      .disposer
      .as_ref()
      .map(|rec| rec.deps.clone())
      .unwrap_or_default()
  }

  fn injector_count(&self) -> usize {
    self.inner.borrow().injectors.len()
  }

  fn injector_injections(&self, index: usize) -> Vec<DepSpec> {
    self
      .inner
      .borrow()
      .injectors
      .get(index)
      .map(|rec| rec.deps.clone())
      .unwrap_or_default()
  }

  fn provide_into(&self, container: &Container, cell: &AssetCell) -> Result<()> {
    let value = self.provide_value(container)?;
    cell.borrow_mut().set_value(Box::new(value));
    Ok(())
  }

  fn inject(&self, container: &Container, cell: &AssetCell) -> Result<()> {
    let runs: Vec<Rc<StageFn>> = self
      .inner
      .borrow()
      .injectors
      .iter()
      .map(|rec| rec.func.clone())
      .collect();
    for run in runs {
      run(container, cell)?;
    }
    Ok(())
  }

  fn initialize(&self, container: &Container, cell: &AssetCell) -> Result<()> {
    let run = self
      .inner
      .borrow()
      .initializer
      .as_ref()
      .map(|rec| rec.func.clone());
    match run {
      Some(func) => func(container, cell),
      None => Ok(()),
    }
  }

  fn dispose(&self, container: &Container, cell: &AssetCell) -> Result<()> {
    let run = self
      .inner
      .borrow()
      .disposer
      .as_ref()
      .map(|rec| rec.func.clone());
    if let Some(func) = run {
      func(container, cell).map_err(|cause| Error::Disposal {
        rid: self.rid.clone(),
        message: "the disposer failed".to_owned(),
        cause: Some(Box::new(cause)),
      })?;
    }
    cell.borrow_mut().set_phase(Phase::Disposed);
    Ok(())
  }

  fn as_any(&self) -> &dyn Any {
    self
  }
}
