//! Public macros for declaring qualifier kinds and building qualifier
//! sets.

/// Declare a new qualifier kind.
///
/// Each kind is a marker type; the macro declares the type and a
/// `qualifier()` constructor on it. Module paths and a trailing `Tag`
/// suffix are stripped from the kind's displayed name.
///
/// # Examples
///
/// A zero-payload kind:
///
/// ```
/// use weft::define_qualifier;
///
/// define_qualifier!(Primary);
///
/// let q = Primary::qualifier();
/// assert_eq!(q.to_string(), "@Primary");
/// assert_eq!(q, Primary::qualifier());
/// ```
///
/// A kind with a typed payload (any payload type convertible into
/// [`QualifierPayload`](crate::QualifierPayload)):
///
/// ```
/// use weft::define_qualifier;
///
/// define_qualifier!(pub Name(String));
///
/// let q = Name::qualifier("foo");
/// assert_eq!(q.as_str(), Some("foo"));
/// assert_ne!(q, Name::qualifier("bar"));
/// ```
#[macro_export]
macro_rules! define_qualifier {
  ($(#[$meta:meta])* $vis:vis $name:ident) => {
    $(#[$meta])*
    #[derive(Debug, Clone, Copy)]
    $vis struct $name;

    impl $name {
      /// Build the qualifier value of this kind.
      $vis fn qualifier() -> $crate::Qualifier {
        $crate::Qualifier::void::<$name>()
      }
    }
  };
  ($(#[$meta:meta])* $vis:vis $name:ident($value:ty)) => {
    $(#[$meta])*
    #[derive(Debug, Clone, Copy)]
    $vis struct $name;

    impl $name {
      /// Build a qualifier value of this kind carrying a payload.
      $vis fn qualifier(value: impl ::core::convert::Into<$value>) -> $crate::Qualifier {
        let value: $value = value.into();
        $crate::Qualifier::with_value::<$name>(value)
      }
    }
  };
}

/// Build a [`QualifierSet`](crate::QualifierSet) from qualifier values.
///
/// Members are inserted with `update`, so for duplicate kinds the last
/// one wins.
///
/// ```
/// use weft::{define_qualifier, qualifiers, Qualifier};
///
/// define_qualifier!(Name(String));
///
/// let set = qualifiers![Qualifier::default(), Name::qualifier("foo")];
/// assert_eq!(set.len(), 2);
/// assert!(qualifiers![].is_empty());
/// ```
#[macro_export]
macro_rules! qualifiers {
  () => {
    $crate::QualifierSet::new()
  };
  ($($q:expr),+ $(,)?) => {{
    let mut set = $crate::QualifierSet::new();
    $( set.update($q); )+
    set
  }};
}
