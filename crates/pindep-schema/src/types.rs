//! Newtype wrappers for digest identifiers, providing compile-time type safety.
//!
//! All newtypes serialize/deserialize as plain strings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;

/// Length of the display prefix returned by `short()`.
pub const SHORT_ID_LEN: usize = 12;

macro_rules! digest_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new instance from a string.
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            /// Return the inner string as a slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume self and return the inner `String`.
            pub fn into_inner(self) -> String {
                self.0
            }

            /// Truncated prefix used for display.
            pub fn short(&self) -> ShortId {
                ShortId(self.0.chars().take(SHORT_ID_LEN).collect())
            }
        }

        impl Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<std::path::Path> for $name {
            fn as_ref(&self) -> &std::path::Path {
                std::path::Path::new(&self.0)
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

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }
    };
}

digest_newtype!(
    /// Full 64-character hex identifier of one binary of a recipe for one settings key.
    PackageId
);

digest_newtype!(
    /// Blake3 digest of a recipe's canonical content.
    RecipeRevision
);

digest_newtype!(
    /// Truncated prefix of a digest, used for display.
    ShortId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn package_id_display_and_as_ref() {
        let id = PackageId::new("abc123");
        assert_eq!(id.to_string(), "abc123");
        assert_eq!(id.as_str(), "abc123");
        assert_eq!(AsRef::<str>::as_ref(&id), "abc123");
    }

    #[test]
    fn package_id_serializes_as_plain_string() {
        let id = PackageId::new("deadbeef");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"deadbeef\"");
        let back: PackageId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn short_truncates_long_digests() {
        let rev = RecipeRevision::new("0123456789abcdef0123");
        assert_eq!(rev.short().as_str(), "0123456789ab");
    }

    #[test]
    fn short_of_non_ascii_id_does_not_split_chars() {
        let id: PackageId = serde_json::from_str("\"aéééééééé\"").unwrap();
        assert_eq!(id.short().as_str(), "aéééééééé");
        let long = PackageId::new("é".repeat(20));
        assert_eq!(long.short().chars().count(), SHORT_ID_LEN);
    }

    #[test]
    fn short_keeps_short_input() {
        let id = PackageId::new("abc");
        assert_eq!(id.short().as_str(), "abc");
    }
}
