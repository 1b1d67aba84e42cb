//! Identifier generation and format checks.
//!
//! Identifiers are 26-character lowercase strings. New ones are ULIDs rendered
//! in lowercase, which keeps them within the `[0-9a-z]` alphabet.

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Length of every identifier.
pub const ID_LEN: usize = 26;

/// Generate a new random identifier.
pub fn new_id() -> String {
    Ulid::new().to_string().to_ascii_lowercase()
}

/// Whether `s` has the shape of a generated identifier.
pub fn is_valid_id(s: &str) -> bool {
    s.len() == ID_LEN
        && s
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
}

/// Identifier of a property field.
///
/// Lookups accept any string, so this does not enforce the format; freshly
/// created fields always get a well-formed one from [`FieldId::new`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldId(String);

impl FieldId {
    /// Create a new random field ID
    pub fn new() -> Self {
        Self(new_id())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for FieldId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for FieldId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for FieldId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<FieldId> for String {
    fn from(id: FieldId) -> Self {
        id.0
    }
}
