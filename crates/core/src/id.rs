// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ID generation abstractions
//!
//! All entity IDs are `<kind>_<ULID>` strings. The ULID part is Crockford
//! base-32 with a millisecond timestamp prefix, so IDs of the same kind sort
//! lexicographically by creation time.

use ulid::Ulid;

/// Trait for truncating identifiers to a short prefix.
pub trait ShortId {
    /// Returns a string slice truncated to at most `n` characters.
    fn short(&self, n: usize) -> &str;
}

impl ShortId for str {
    fn short(&self, n: usize) -> &str {
        if self.len() <= n {
            self
        } else {
            &self[..n]
        }
    }
}

/// Generate a fresh `<kind>_<ULID>` identifier string.
pub fn generate(kind: &str) -> String {
    format!("{}_{}", kind, Ulid::new())
}

/// Derive a `<kind>_<ULID>` identifier that reuses the ULID of an existing
/// ID.
///
/// Used by the reducer for entities created while applying an event (goals,
/// artifacts, context messages): deriving from the event ID keeps replay
/// deterministic while preserving creation-time ordering.
pub fn derive(kind: &str, source: &str) -> String {
    let suffix = source.rsplit('_').next().unwrap_or(source);
    format!("{kind}_{suffix}")
}

/// Define a newtype ID wrapper around `String` with a typed kind prefix.
///
/// Generates `generate()` (fresh ULID), `derived_from()` (reuse another ID's
/// ULID), `new()`, `as_str()`, `short()`, `Display`, `From<String>`,
/// `From<&str>`, `PartialEq<str>`, `PartialEq<&str>`, and `Borrow<str>`
/// implementations.
///
/// ```ignore
/// define_id! {
///     /// Doc comment for the ID type.
///     pub struct MyId, "kind";
/// }
/// ```
#[macro_export]
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        pub struct $name:ident, $kind:literal;
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
        pub struct $name(pub String);

        impl $name {
            /// The `<kind>` prefix for this ID type.
            pub const KIND: &'static str = $kind;

            /// Generate a fresh ID with a new ULID.
            pub fn generate() -> Self {
                Self($crate::id::generate($kind))
            }

            /// Derive an ID that reuses the ULID suffix of `source`.
            pub fn derived_from(source: &str) -> Self {
                Self($crate::id::derive($kind, source))
            }

            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Returns a string slice truncated to at most `n` characters.
            pub fn short(&self, n: usize) -> &str {
                if self.0.len() <= n {
                    &self.0
                } else {
                    &self.0[..n]
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
