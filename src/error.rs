//! The error surface of the container.
//!
//! Every failure names the offending resource, and failures that wrap an
//! underlying failure keep it as a chained source so callers can unwind
//! and print the whole story.

use std::fmt::Write as _;

use thiserror::Error;

use crate::resource::ResourceId;

/// The main error type for `weft` operations.
#[derive(Debug, Error)]
pub enum Error {
  /// An illegal configuration of a resource manager, such as installing a
  /// second provider for a resource that already has one.
  #[error("illegal configuration of {rid}: {message}")]
  Configuration {
    /// The resource whose configuration was rejected.
    rid: ResourceId,
    /// What was illegal about it.
    message: String,
  },

  /// Instantiating a resource instance failed: a missing provider, an
  /// undeclared resource or dependency, or a cyclical dependency that no
  /// injector interleaving can break.
  #[error("instantiation of {rid} failed: {message}")]
  Instantiation {
    /// The resource whose instantiation failed.
    rid: ResourceId,
    /// What went wrong at this level.
    message: String,
    /// The underlying failure, if this error wraps one.
    #[source]
    cause: Option<Box<Error>>,
  },

  /// Disposing of a resource instance failed. Disposal of the remaining
  /// instances in the same context continues; the first failure is the
  /// one reported.
  #[error("disposal of {rid} failed: {message}")]
  Disposal {
    /// The resource whose disposal failed.
    rid: ResourceId,
    /// What went wrong at this level.
    message: String,
    /// The underlying failure, if this error wraps one.
    #[source]
    cause: Option<Box<Error>>,
  },

  /// A request was made against a scope with no live activation.
  #[error("scope {scope} is inactive while allocating {rid}")]
  InactiveScope {
    /// The scope that was inactive.
    scope: String,
    /// The resource that was requested.
    rid: ResourceId,
  },

  /// A stored value was read out at a type differing from the type it was
  /// stored with. This indicates a bug in the program, not bad user
  /// input; it is never recoverable.
  #[error("type mismatch for {rid}: the stored value is not a {expected}")]
  TypeMismatch {
    /// The resource whose asset held the value.
    rid: ResourceId,
    /// The type the caller asked for.
    expected: &'static str,
  },
}

/// A specialized `Result` type for container operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Render an error and its whole source chain, one indented line per
/// level. Useful for diagnostics and for asserting on nested causes.
pub fn render_error_chain(err: &dyn std::error::Error) -> String {
  let mut out = String::new();
  let mut level = 0usize;
  let mut current: Option<&dyn std::error::Error> = Some(err);
  while let Some(e) = current {
    let _ = writeln!(out, "{:indent$}error: {}", "", e, indent = level);
    current = e.source();
    level += 1;
  }
  out
}
