#![warn(missing_docs, rust_2018_idioms)]

//! A contexts-and-dependency-injection (CDI) container for Rust.
//!
//! Weft manages the lifecycle of typed, qualified *resources*: client
//! code declares resources, registers providers / injectors /
//! initializers / disposers for them, then requests instances. The
//! container computes instances in dependency order, breaks dependency
//! cycles that pass through injectors, detects the ones it cannot break,
//! and disposes instances when their enclosing scope ends.
//!
//! ## Core concepts
//!
//! - **Resource** ([`Resource`]): a typed, scoped, qualified descriptor
//!   of a kind of instance. The handle holds no instance.
//! - **Qualifier** ([`Qualifier`], [`QualifierSet`]): runtime annotations
//!   distinguishing resources that share an instance type.
//! - **Scope** ([`GlobalScope`], [`GuardedScope`], [`LocalScope`],
//!   [`NewScope`]): the policy deciding where instances live, how they
//!   are shared and when they are disposed.
//! - **Lifecycle phases** ([`Phase`]): every instance moves through
//!   allocated → provided → injected → created → disposed; dependencies
//!   declared on different callbacks bind to different phases, which is
//!   what lets the engine interleave work and break cycles.
//! - **Container** ([`Container`]): the registry and instantiation
//!   engine. A per-thread default instance backs the convenience methods
//!   on resource handles.
//!
//! ## Quick start
//!
//! ```
//! use weft::{define_qualifier, qualifiers, Global};
//!
//! define_qualifier!(Name(String));
//!
//! let width = Global::<i64>::new(qualifiers![Name::qualifier("width")]);
//! let area = Global::<i64>::new(qualifiers![Name::qualifier("area")]);
//!
//! width.provide(|| 10)?;
//! area.provide_with((width.clone(),), |(w,)| w * w)?;
//!
//! assert_eq!(area.get()?, 100);
//! assert_eq!(width.get()?, 10);
//! # Ok::<(), weft::Error>(())
//! ```
//!
//! ## Breaking cycles with injectors
//!
//! A dependency declared on a *provider* must exist before the dependent
//! value can be constructed. A dependency declared on an *injector* only
//! needs its target provided, not fully wired, so two resources can
//! reference each other as long as at least one edge of the cycle goes
//! through an injector:
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use weft::{Global, QualifierSet};
//!
//! #[derive(Clone, Default)]
//! struct Node { other: Option<Rc<RefCell<Node>>> }
//!
//! let a = Global::<Rc<RefCell<Node>>>::new(QualifierSet::new());
//! let b = Global::<Rc<RefCell<Node>>, u8>::new(QualifierSet::new());
//!
//! a.provide(|| Rc::new(RefCell::new(Node::default())))?
//!   .inject_with((b.clone(),), |node, (other,)| node.borrow_mut().other = Some(other));
//! b.provide(|| Rc::new(RefCell::new(Node::default())))?
//!   .inject_with((a.clone(),), |node, (other,)| node.borrow_mut().other = Some(other));
//!
//! let first = a.get()?;
//! let second = b.get()?;
//! assert!(Rc::ptr_eq(first.borrow().other.as_ref().unwrap(), &second));
//! assert!(Rc::ptr_eq(second.borrow().other.as_ref().unwrap(), &first));
//! # Ok::<(), weft::Error>(())
//! ```

pub mod asset;
pub mod container;
pub mod error;
pub mod manager;
pub mod qualifier;
pub mod resource;
pub mod scope;

mod checker;
mod internal;
mod macros;

pub use asset::{Asset, AssetCell, Phase};
pub use container::{default_container, Container};
pub use error::{render_error_chain, Error, Result};
pub use manager::{DepSpec, Dependency, InjectionList, ResourceManager};
pub use qualifier::{Qualifier, QualifierPayload, QualifierSet};
pub use resource::{Global, Resource, ResourceId};
pub use scope::{
  GlobalScope, GuardedActivation, GuardedScope, LocalActivation, LocalScope, NewScope, Scope,
};
