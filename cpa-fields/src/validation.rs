//! Validation and patch merging.
//!
//! Checks run in a fixed order and stop at the first failure, so the error a
//! caller sees always names the earliest rule that was broken.

use std::collections::HashSet;

use tracing::trace;

use crate::error::{FieldsError, Result};
use crate::id::is_valid_id;
use crate::types::{
    PropertyField, PropertyFieldPatch, RawPropertyField, SelectFieldConfig, SelectOption,
};

/// Longest accepted field name, in characters.
pub const NAME_MAX_CHARS: usize = 255;

impl SelectOption {
    /// Check ID presence, ID format, name, then color.
    pub fn is_valid(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(FieldsError::invalid("id cannot be empty"));
        }
        if !is_valid_id(&self.id) {
            return Err(FieldsError::invalid("id is not a valid ID"));
        }
        if self.name.is_empty() {
            return Err(FieldsError::invalid("name cannot be empty"));
        }
        if self.color.is_empty() {
            return Err(FieldsError::invalid("color cannot be empty"));
        }
        Ok(())
    }
}

impl SelectFieldConfig {
    /// Every option must be valid and option IDs must be unique.
    pub fn is_valid(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for (index, option) in self.options.iter().enumerate() {
            option
                .is_valid()
                .map_err(|e| FieldsError::invalid_option(index, e))?;
            if !seen.insert(option.id.as_str()) {
                return Err(FieldsError::invalid(format!(
                    "duplicate option id: {}",
                    option.id
                )));
            }
        }
        Ok(())
    }
}

impl PropertyField {
    /// Validate a decoded field.
    ///
    /// Unknown kinds and malformed option payloads never reach this point;
    /// they are rejected when the raw field is decoded.
    pub fn is_valid(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(FieldsError::invalid("name cannot be empty"));
        }
        if self.name.chars().count() > NAME_MAX_CHARS {
            return Err(FieldsError::invalid(format!(
                "name cannot be longer than {NAME_MAX_CHARS} characters"
            )));
        }
        if let Some(cfg) = self.config.select() {
            cfg.is_valid()?;
        }
        Ok(())
    }

    /// Merge `patch` over this field and return the result.
    ///
    /// `self` is left untouched. Because a patch may change the type or
    /// replace attrs, the merge happens on the wire shape and the outcome is
    /// decoded again; the merged field still has to pass [`is_valid`] before
    /// it may be stored.
    ///
    /// [`is_valid`]: PropertyField::is_valid
    pub fn apply_patch(&self, patch: &PropertyFieldPatch) -> Result<PropertyField> {
        let mut raw = self.to_raw();
        if let Some(name) = &patch.name {
            raw.name = name.clone();
        }
        if let Some(field_type) = patch.field_type {
            raw.field_type = field_type.as_str().to_string();
        }
        if let Some(attrs) = &patch.attrs {
            raw.attrs = attrs.clone();
        }
        trace!(id = %self.id, ?patch, "applying field patch");
        PropertyField::try_from(raw)
    }
}

/// Decode and validate a wire field in one step.
pub fn validate_raw_field(raw: RawPropertyField) -> Result<PropertyField> {
    let field = PropertyField::try_from(raw)?;
    field.is_valid()?;
    Ok(field)
}
