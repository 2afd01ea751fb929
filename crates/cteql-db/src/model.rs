//! Model metadata consumed by the SQL compiler.
//!
//! [`ModelMeta`] is the read-only view of a model the compiler needs: the
//! model name (used as the default query alias), the table name, and the
//! ordered list of columns including the primary key, timestamp columns and
//! any foreign keys contributed by associations.

use crate::fields::{FieldDef, FieldType};

/// Metadata about a model.
///
/// # Examples
///
/// ```
/// use cteql_db::fields::FieldType;
/// use cteql_db::model::ModelMeta;
///
/// let user = ModelMeta::new("user", "users")
///     .field("amount", FieldType::IntegerField)
///     .with_timestamps();
///
/// let columns: Vec<&str> = user.columns().collect();
/// assert_eq!(columns, vec!["id", "amount", "createdAt", "updatedAt"]);
/// assert_eq!(user.pk_column(), "id");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelMeta {
    /// The model name (e.g. "user"); the default alias in generated SQL.
    pub name: String,
    /// The database table name (e.g. "users").
    pub db_table: String,
    /// Field definitions in declaration order.
    pub fields: Vec<FieldDef>,
}

impl ModelMeta {
    /// Creates a model with an auto-incrementing `id` primary key.
    pub fn new(name: impl Into<String>, db_table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            db_table: db_table.into(),
            fields: vec![FieldDef::new("id", FieldType::AutoField).primary_key()],
        }
    }

    /// Creates a model with no fields at all; the caller declares the
    /// primary key explicitly.
    pub fn bare(name: impl Into<String>, db_table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            db_table: db_table.into(),
            fields: Vec::new(),
        }
    }

    /// Appends a field with the given name and type.
    #[must_use]
    pub fn field(self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.with_field(FieldDef::new(name, field_type))
    }

    /// Appends a fully specified field.
    #[must_use]
    pub fn with_field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    /// Appends the `createdAt` and `updatedAt` audit columns.
    #[must_use]
    pub fn with_timestamps(self) -> Self {
        self.field("createdAt", FieldType::DateTimeField)
            .field("updatedAt", FieldType::DateTimeField)
    }

    /// Returns the column names in declaration order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.column.as_str())
    }

    /// Returns `true` if the model has a column with this name.
    pub fn has_column(&self, column: &str) -> bool {
        self.fields.iter().any(|f| f.column == column)
    }

    /// Looks up a field by attribute name, falling back to column name.
    pub fn get_field(&self, name: &str) -> Option<&FieldDef> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .or_else(|| self.fields.iter().find(|f| f.column == name))
    }

    /// Maps an attribute name to its column, passing unknown names through.
    pub fn column_for<'a>(&'a self, name: &'a str) -> &'a str {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map_or(name, |f| f.column.as_str())
    }

    /// Returns the primary key field, if one is declared.
    pub fn pk(&self) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.primary_key)
    }

    /// Returns the primary key column name, defaulting to `id`.
    pub fn pk_column(&self) -> &str {
        self.pk().map_or("id", |f| f.column.as_str())
    }

    /// Returns the primary key attribute name, defaulting to `id`.
    pub fn pk_name(&self) -> &str {
        self.pk().map_or("id", |f| f.name.as_str())
    }
}
