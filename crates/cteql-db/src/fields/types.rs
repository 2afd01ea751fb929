//! Field type definitions for model metadata.
//!
//! Each [`FieldType`] variant is the semantic type of a column. The SQL
//! compiler never emits DDL, so the type only matters for diagnostics and
//! for typing the foreign-key columns that associations add.

/// The semantic type of a model field.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type")]
pub enum FieldType {
    /// Auto-incrementing 32-bit integer primary key.
    AutoField,
    /// Auto-incrementing 64-bit integer primary key.
    BigAutoField,
    /// Variable-length string.
    CharField,
    /// Unlimited-length text.
    TextField,
    /// 32-bit signed integer.
    IntegerField,
    /// 64-bit signed integer.
    BigIntegerField,
    /// 64-bit floating-point number.
    FloatField,
    /// Fixed-precision decimal number.
    DecimalField {
        /// Maximum total digits.
        max_digits: u32,
        /// Digits after the decimal point.
        decimal_places: u32,
    },
    /// Boolean (true/false).
    BooleanField,
    /// Date without time.
    DateField,
    /// Date and time.
    DateTimeField,
    /// UUID field.
    UuidField,
    /// JSON data.
    JsonField,
    /// Many-to-one key column referencing another model.
    ForeignKey {
        /// The target model name.
        to: String,
    },
}

impl FieldType {
    /// Returns `true` for auto-incrementing key types.
    pub const fn is_auto(&self) -> bool {
        matches!(self, Self::AutoField | Self::BigAutoField)
    }
}

/// Definition of a single model field.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FieldDef {
    /// The attribute name of this field.
    pub name: String,
    /// The database column name (may differ from `name`).
    pub column: String,
    /// The type of this field.
    #[serde(flatten)]
    pub field_type: FieldType,
    /// Whether this field is the primary key.
    #[serde(default)]
    pub primary_key: bool,
    /// Whether NULL is allowed in the database.
    #[serde(default)]
    pub null: bool,
}

impl FieldDef {
    /// Creates a new `FieldDef` whose column name equals its attribute name.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        let name = name.into();
        Self {
            column: name.clone(),
            name,
            field_type,
            primary_key: false,
            null: false,
        }
    }

    /// Sets the database column name.
    #[must_use]
    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = column.into();
        self
    }

    /// Marks this field as the primary key.
    #[must_use]
    pub const fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Allows NULL values in the database.
    #[must_use]
    pub const fn nullable(mut self) -> Self {
        self.null = true;
        self
    }

    /// Returns `true` if this field holds a key into another model.
    pub const fn is_relation(&self) -> bool {
        matches!(self.field_type, FieldType::ForeignKey { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_def_new_defaults() {
        let f = FieldDef::new("amount", FieldType::IntegerField);
        assert_eq!(f.name, "amount");
        assert_eq!(f.column, "amount");
        assert!(!f.primary_key);
        assert!(!f.null);
    }

    #[test]
    fn test_field_def_builder() {
        let f = FieldDef::new("createdAt", FieldType::DateTimeField)
            .column("created_at")
            .nullable();
        assert_eq!(f.column, "created_at");
        assert!(f.null);
    }

    #[test]
    fn test_field_def_is_relation() {
        let fk = FieldDef::new("reportId", FieldType::ForeignKey { to: "user".into() });
        assert!(fk.is_relation());
        assert!(!FieldDef::new("amount", FieldType::IntegerField).is_relation());
    }

    #[test]
    fn test_is_auto() {
        assert!(FieldType::BigAutoField.is_auto());
        assert!(FieldType::AutoField.is_auto());
        assert!(!FieldType::UuidField.is_auto());
    }

    #[test]
    fn test_field_def_deserialize() {
        let f: FieldDef = serde_json::from_value(serde_json::json!({
            "name": "budget",
            "column": "budget",
            "type": "IntegerField"
        }))
        .unwrap();
        assert_eq!(f.field_type, FieldType::IntegerField);
        assert!(!f.primary_key);
    }
}
