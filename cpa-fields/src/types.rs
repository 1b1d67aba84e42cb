//! Core field types.
//!
//! A [`PropertyField`] is the typed form of a custom profile attribute. It
//! serializes to and from [`RawPropertyField`], the wire shape in which
//! `type` is a plain string and `attrs` an open mapping. Converting a raw
//! field is the one place attrs are interpreted.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::attrs::{Attrs, FieldAttrs, OPTIONS_KEY};
use crate::error::{FieldsError, Result};
use crate::id::{new_id, FieldId};

/// The kind of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Select,
    Multiselect,
    Date,
    User,
    Multiuser,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Select => "select",
            FieldType::Multiselect => "multiselect",
            FieldType::Date => "date",
            FieldType::User => "user",
            FieldType::Multiuser => "multiuser",
        }
    }

    /// Whether fields of this kind carry a list of select options.
    pub fn has_options(&self) -> bool {
        matches!(self, FieldType::Select | FieldType::Multiselect)
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FieldType {
    type Err = FieldsError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "text" => Ok(FieldType::Text),
            "select" => Ok(FieldType::Select),
            "multiselect" => Ok(FieldType::Multiselect),
            "date" => Ok(FieldType::Date),
            "user" => Ok(FieldType::User),
            "multiuser" => Ok(FieldType::Multiuser),
            other => Err(FieldsError::invalid(format!(
                "type is not a valid field type: {other:?}"
            ))),
        }
    }
}

/// One choice within a select or multiselect field.
///
/// Missing keys decode as empty strings so that `is_valid()` reports which
/// one is absent rather than failing the whole decode. Other keys are kept
/// in `extra` and written back unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub color: String,
    #[serde(flatten)]
    pub extra: Attrs,
}

impl SelectOption {
    /// Build an option with a freshly generated ID. Nothing is validated here.
    pub fn new(name: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            name: name.into(),
            color: color.into(),
            extra: Attrs::new(),
        }
    }

    fn to_value(&self) -> Value {
        let mut map = self.extra.clone();
        map.insert("id".to_string(), Value::String(self.id.clone()));
        map.insert("name".to_string(), Value::String(self.name.clone()));
        map.insert("color".to_string(), Value::String(self.color.clone()));
        Value::Object(map)
    }
}

/// Payload of select and multiselect fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectFieldConfig {
    pub options: Vec<SelectOption>,
}

impl SelectFieldConfig {
    pub fn new(options: Vec<SelectOption>) -> Self {
        Self { options }
    }

    /// Append an option.
    pub fn option(mut self, option: SelectOption) -> Self {
        self.options.push(option);
        self
    }

    /// Look up an option by ID.
    pub fn get(&self, id: &str) -> Option<&SelectOption> {
        self.options.iter().find(|o| o.id == id)
    }
}

/// Type-specific configuration, tagged by field kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldConfig {
    Text,
    Select(SelectFieldConfig),
    Multiselect(SelectFieldConfig),
    Date,
    User,
    Multiuser,
}

impl FieldConfig {
    pub fn field_type(&self) -> FieldType {
        match self {
            FieldConfig::Text => FieldType::Text,
            FieldConfig::Select(_) => FieldType::Select,
            FieldConfig::Multiselect(_) => FieldType::Multiselect,
            FieldConfig::Date => FieldType::Date,
            FieldConfig::User => FieldType::User,
            FieldConfig::Multiuser => FieldType::Multiuser,
        }
    }

    /// The select payload, for kinds that have one.
    pub fn select(&self) -> Option<&SelectFieldConfig> {
        match self {
            FieldConfig::Select(cfg) | FieldConfig::Multiselect(cfg) => Some(cfg),
            _ => None,
        }
    }

    /// Pull the type-specific keys for `field_type` out of `attrs`.
    fn decode(field_type: FieldType, attrs: &mut Attrs) -> Result<Self> {
        let config = match field_type {
            FieldType::Text => FieldConfig::Text,
            FieldType::Date => FieldConfig::Date,
            FieldType::User => FieldConfig::User,
            FieldType::Multiuser => FieldConfig::Multiuser,
            FieldType::Select | FieldType::Multiselect => {
                let raw = attrs.remove(OPTIONS_KEY).ok_or_else(|| {
                    FieldsError::invalid(format!("{field_type} field requires an options list"))
                })?;
                let options: Vec<SelectOption> = serde_json::from_value(raw).map_err(|e| {
                    FieldsError::invalid(format!("options must be a list of select options: {e}"))
                })?;
                let cfg = SelectFieldConfig::new(options);
                if field_type == FieldType::Select {
                    FieldConfig::Select(cfg)
                } else {
                    FieldConfig::Multiselect(cfg)
                }
            }
        };
        Ok(config)
    }

    fn encode_into(&self, attrs: &mut Attrs) {
        if let Some(cfg) = self.select() {
            let options = cfg.options.iter().map(SelectOption::to_value).collect();
            attrs.insert(OPTIONS_KEY.to_string(), Value::Array(options));
        }
    }
}

/// The wire shape of a field definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawPropertyField {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub field_type: String,
    #[serde(default)]
    pub attrs: Attrs,
    #[serde(default)]
    pub create_at: i64,
    #[serde(default)]
    pub update_at: i64,
    #[serde(default)]
    pub delete_at: i64,
}

/// A custom profile attribute field definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPropertyField", into = "RawPropertyField")]
pub struct PropertyField {
    pub id: FieldId,
    pub name: String,
    pub config: FieldConfig,
    pub attrs: FieldAttrs,
    pub create_at: i64,
    pub update_at: i64,
    delete_at: i64,
}

impl PropertyField {
    /// A new, unsaved field. ID and timestamps are assigned on creation.
    pub fn new(name: impl Into<String>, config: FieldConfig) -> Self {
        Self {
            id: FieldId::default(),
            name: name.into(),
            config,
            attrs: FieldAttrs::default(),
            create_at: 0,
            update_at: 0,
            delete_at: 0,
        }
    }

    pub fn with_attrs(mut self, attrs: FieldAttrs) -> Self {
        self.attrs = attrs;
        self
    }

    pub fn field_type(&self) -> FieldType {
        self.config.field_type()
    }

    /// Select options, empty for kinds without any.
    pub fn options(&self) -> &[SelectOption] {
        self.config
            .select()
            .map(|cfg| cfg.options.as_slice())
            .unwrap_or_default()
    }

    // --- Soft delete ---

    pub fn is_active(&self) -> bool {
        self.delete_at == 0
    }

    pub fn is_deleted(&self) -> bool {
        !self.is_active()
    }

    /// When the field was deleted, if it was.
    pub fn deleted_at(&self) -> Option<i64> {
        self.is_deleted().then_some(self.delete_at)
    }

    /// Mark the field deleted at `when` (milliseconds). Non-positive times
    /// are stored as 1 so the field can never read back as active.
    pub fn mark_deleted(&mut self, when: i64) {
        self.delete_at = when.max(1);
    }

    pub fn mark_active(&mut self) {
        self.delete_at = 0;
    }

    /// The wire shape of this field.
    pub fn to_raw(&self) -> RawPropertyField {
        let mut attrs = self.attrs.encode();
        self.config.encode_into(&mut attrs);
        RawPropertyField {
            id: self.id.to_string(),
            name: self.name.clone(),
            field_type: self.field_type().as_str().to_string(),
            attrs,
            create_at: self.create_at,
            update_at: self.update_at,
            delete_at: self.delete_at,
        }
    }
}

impl TryFrom<RawPropertyField> for PropertyField {
    type Error = FieldsError;

    fn try_from(raw: RawPropertyField) -> Result<Self> {
        let field_type: FieldType = raw.field_type.parse()?;
        let mut attrs = raw.attrs;
        let config = FieldConfig::decode(field_type, &mut attrs)?;
        let attrs = FieldAttrs::decode(attrs)?;

        Ok(Self {
            id: FieldId::from(raw.id),
            name: raw.name,
            config,
            attrs,
            create_at: raw.create_at,
            update_at: raw.update_at,
            delete_at: raw.delete_at,
        })
    }
}

impl From<PropertyField> for RawPropertyField {
    fn from(field: PropertyField) -> Self {
        field.to_raw()
    }
}

/// A sparse update. `None` leaves the attribute alone; `Some` replaces it,
/// even with an empty value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyFieldPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub field_type: Option<FieldType>,
    /// Replaces the whole attrs mapping when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attrs: Option<Attrs>,
}

impl PropertyFieldPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_type(mut self, field_type: FieldType) -> Self {
        self.field_type = Some(field_type);
        self
    }

    pub fn with_attrs(mut self, attrs: Attrs) -> Self {
        self.attrs = Some(attrs);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.field_type.is_none() && self.attrs.is_none()
    }
}
