//! Common field attributes.
//!
//! On the wire a field's `attrs` is an open mapping. The keys every field type
//! understands are decoded here into [`FieldAttrs`]; anything unrecognised is
//! kept verbatim in `extra` so it survives a round trip untouched.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{FieldsError, Result};

/// The open attrs mapping as it appears on the wire.
pub type Attrs = serde_json::Map<String, Value>;

pub const VISIBILITY_KEY: &str = "visibility";
pub const SORT_ORDER_KEY: &str = "sort_order";
pub const OPTIONS_KEY: &str = "options";

/// When a field is shown on a user's profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Default,
    WhenSet,
    Always,
    Hidden,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Default => "default",
            Visibility::WhenSet => "when_set",
            Visibility::Always => "always",
            Visibility::Hidden => "hidden",
        }
    }
}

impl std::fmt::Display for Visibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Visibility {
    type Err = FieldsError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "default" => Ok(Visibility::Default),
            "when_set" => Ok(Visibility::WhenSet),
            "always" => Ok(Visibility::Always),
            "hidden" => Ok(Visibility::Hidden),
            other => Err(FieldsError::invalid(format!(
                "visibility is not valid: {other}"
            ))),
        }
    }
}

/// Attributes shared by every field type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldAttrs {
    pub visibility: Option<Visibility>,
    pub sort_order: Option<f64>,
    /// Keys this crate does not interpret, preserved as given.
    pub extra: Attrs,
}

impl FieldAttrs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = Some(visibility);
        self
    }

    pub fn with_sort_order(mut self, sort_order: f64) -> Self {
        self.sort_order = Some(sort_order);
        self
    }

    /// Attach an uninterpreted attribute.
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Decode the common keys out of `raw`. Type-specific keys must already
    /// have been removed by the caller; whatever is left ends up in `extra`.
    pub(crate) fn decode(mut raw: Attrs) -> Result<Self> {
        let visibility = match raw.remove(VISIBILITY_KEY) {
            None => None,
            Some(Value::String(s)) => Some(s.parse()?),
            Some(other) => {
                return Err(FieldsError::invalid(format!(
                    "visibility is not valid: {other}"
                )))
            }
        };

        let sort_order = match raw.remove(SORT_ORDER_KEY) {
            None => None,
            Some(value) => Some(
                value
                    .as_f64()
                    .ok_or_else(|| FieldsError::invalid("sort_order must be a number"))?,
            ),
        };

        Ok(Self {
            visibility,
            sort_order,
            extra: raw,
        })
    }

    /// Render back into the open mapping.
    pub(crate) fn encode(&self) -> Attrs {
        let mut out = self.extra.clone();
        if let Some(visibility) = self.visibility {
            out.insert(
                VISIBILITY_KEY.to_string(),
                Value::String(visibility.as_str().to_string()),
            );
        }
        if let Some(sort_order) = self.sort_order {
            out.insert(SORT_ORDER_KEY.to_string(), Value::from(sort_order));
        }
        out
    }
}
