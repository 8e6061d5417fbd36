//! Small private helpers shared across the crate: hash mixing and
//! human-readable type names.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Mix a value into a running seed.
///
/// Same mixing constants as the classic boost-style combiner, widened to
/// 64 bits.
#[inline]
pub(crate) fn hash_combine(seed: &mut u64, value: u64) {
  *seed ^= value
    .wrapping_add(0x9e37_79b9_7f4a_7c15)
    .wrapping_add(seed.wrapping_shl(6))
    .wrapping_add(seed.wrapping_shr(2));
}

/// One-shot hash of any `Hash` value.
#[inline]
pub(crate) fn hash_of<T: Hash + ?Sized>(value: &T) -> u64 {
  let mut hasher = DefaultHasher::new();
  value.hash(&mut hasher);
  hasher.finish()
}

/// Strip module paths from a `std::any::type_name` rendering, keeping the
/// generic structure: `alloc::rc::Rc<core::cell::RefCell<app::Node>>`
/// becomes `Rc<RefCell<Node>>`.
pub(crate) fn short_type_name(full: &str) -> String {
  let mut out = String::with_capacity(full.len());
  let mut segment = String::new();
  let mut chars = full.chars().peekable();
  while let Some(c) = chars.next() {
    if c == ':' && chars.peek() == Some(&':') {
      chars.next();
      segment.clear();
    } else if c.is_alphanumeric() || c == '_' {
      segment.push(c);
    } else {
      out.push_str(&segment);
      segment.clear();
      out.push(c);
    }
  }
  out.push_str(&segment);
  out
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn short_names_strip_paths_but_keep_structure() {
    assert_eq!(short_type_name("i64"), "i64");
    assert_eq!(
      short_type_name("alloc::rc::Rc<core::cell::RefCell<app::Node>>"),
      "Rc<RefCell<Node>>"
    );
    assert_eq!(
      short_type_name("weft::resource::Resource<i64, weft::scope::GlobalScope, ()>"),
      "Resource<i64, GlobalScope, ()>"
    );
  }

  #[test]
  fn hash_combine_is_order_sensitive() {
    let mut a = 0u64;
    hash_combine(&mut a, 1);
    hash_combine(&mut a, 2);
    let mut b = 0u64;
    hash_combine(&mut b, 2);
    hash_combine(&mut b, 1);
    assert_ne!(a, b);
  }
}
