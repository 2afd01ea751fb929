//! Model and association registry.
//!
//! The [`ModelRegistry`] holds every [`ModelMeta`] the compiler may reach and
//! the [`Association`] edges between them. It is built once, then shared
//! read-only by any number of compilations.
//!
//! Foreign keys follow the usual camel-cased defaults:
//!
//! | Kind | Key lives on | Default name |
//! |---|---|---|
//! | `has_one` | target | `{as}{Pk}` (e.g. `reportId`) |
//! | `has_many` | target | `{source}{Pk}` (e.g. `userId`) |
//! | `belongs_to` | source | `{as}{Pk}` (e.g. `managerId`) |

use std::collections::HashMap;

use cteql_core::{CteqlError, CteqlResult, ValidationError};

use crate::fields::{FieldDef, FieldType};
use crate::model::ModelMeta;

/// The kind of an association, which decides where the foreign key lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssociationKind {
    /// One target row holds the source's key.
    HasOne,
    /// Many target rows hold the source's key.
    HasMany,
    /// The source row holds the target's key.
    BelongsTo,
}

impl AssociationKind {
    /// Returns `true` when the foreign key column lives on the target model.
    pub const fn key_on_target(self) -> bool {
        matches!(self, Self::HasOne | Self::HasMany)
    }
}

/// A directed edge from a source model to a target model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Association {
    /// The alias the association is reached by (e.g. "report").
    pub name: String,
    /// The source model name.
    pub source: String,
    /// The target model name.
    pub target: String,
    /// Association kind.
    pub kind: AssociationKind,
    /// The foreign key column, on the target for `has_*`, on the source for
    /// `belongs_to`.
    pub foreign_key: String,
}

impl Association {
    /// Returns the `(source column, target column)` pair the join equates.
    pub fn join_columns<'a>(
        &'a self,
        source: &'a ModelMeta,
        target: &'a ModelMeta,
    ) -> (&'a str, &'a str) {
        if self.kind.key_on_target() {
            (source.pk_column(), self.foreign_key.as_str())
        } else {
            (self.foreign_key.as_str(), target.pk_column())
        }
    }
}

/// In-memory registry of models and their associations.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    models: HashMap<String, ModelMeta>,
    associations: HashMap<(String, String), Association>,
}

impl ModelRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a model.
    ///
    /// # Errors
    ///
    /// Returns a validation error if a model with the same name exists.
    pub fn register(&mut self, model: ModelMeta) -> CteqlResult<()> {
        if self.models.contains_key(&model.name) {
            return Err(CteqlError::Validation(
                ValidationError::new(
                    format!("Model '{}' is already registered", model.name),
                    "duplicate_model",
                )
                .with_param("model", &model.name),
            ));
        }
        self.models.insert(model.name.clone(), model);
        Ok(())
    }

    /// Looks up a model by name.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the model is not registered.
    pub fn model(&self, name: &str) -> CteqlResult<&ModelMeta> {
        self.models.get(name).ok_or_else(|| {
            CteqlError::Validation(
                ValidationError::new(
                    format!("Unknown model '{name}'"),
                    "unknown_model",
                )
                .with_param("model", name),
            )
        })
    }

    /// Returns the registered model names, sorted.
    pub fn model_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.models.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Looks up an association on `model` by alias.
    ///
    /// # Errors
    ///
    /// Returns [`CteqlError::UnknownAssociation`] if the alias is not
    /// declared on the model.
    pub fn association(&self, model: &str, name: &str) -> CteqlResult<&Association> {
        self.associations
            .get(&(model.to_string(), name.to_string()))
            .ok_or_else(|| CteqlError::UnknownAssociation {
                model: model.to_string(),
                association: name.to_string(),
            })
    }

    /// Returns every association declared on `model`, sorted by alias.
    pub fn associations_of(&self, model: &str) -> Vec<&Association> {
        let mut found: Vec<&Association> = self
            .associations
            .values()
            .filter(|a| a.source == model)
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name));
        found
    }

    /// Declares `source has_one target as name` with the default key.
    ///
    /// # Errors
    ///
    /// See [`associate`](Self::associate).
    pub fn has_one(&mut self, source: &str, target: &str, name: &str) -> CteqlResult<()> {
        self.associate(source, target, name, AssociationKind::HasOne, None)
    }

    /// Declares `source has_many target as name` with the default key.
    ///
    /// # Errors
    ///
    /// See [`associate`](Self::associate).
    pub fn has_many(&mut self, source: &str, target: &str, name: &str) -> CteqlResult<()> {
        self.associate(source, target, name, AssociationKind::HasMany, None)
    }

    /// Declares `source belongs_to target as name` with the default key.
    ///
    /// # Errors
    ///
    /// See [`associate`](Self::associate).
    pub fn belongs_to(&mut self, source: &str, target: &str, name: &str) -> CteqlResult<()> {
        self.associate(source, target, name, AssociationKind::BelongsTo, None)
    }

    /// Declares an association, optionally overriding the foreign key.
    ///
    /// The foreign key column is appended to the owning model as a nullable
    /// [`FieldType::ForeignKey`] when the model does not declare it already.
    ///
    /// # Errors
    ///
    /// Returns a validation error if either model is unknown or the alias is
    /// already taken on the source model.
    pub fn associate(
        &mut self,
        source: &str,
        target: &str,
        name: &str,
        kind: AssociationKind,
        foreign_key: Option<&str>,
    ) -> CteqlResult<()> {
        let source_meta = self.model(source)?;
        let target_meta = self.model(target)?;
        let key = (source.to_string(), name.to_string());
        if self.associations.contains_key(&key) {
            return Err(CteqlError::Validation(
                ValidationError::new(
                    format!("Association '{name}' is already declared on model '{source}'"),
                    "duplicate_association",
                )
                .with_param("model", source)
                .with_param("association", name),
            ));
        }

        let foreign_key = foreign_key.map_or_else(
            || match kind {
                AssociationKind::HasOne => camel_key(name, source_meta.pk_name()),
                AssociationKind::HasMany => camel_key(&source_meta.name, source_meta.pk_name()),
                AssociationKind::BelongsTo => camel_key(name, target_meta.pk_name()),
            },
            ToString::to_string,
        );

        let (owner, referenced) = if kind.key_on_target() {
            (target, source)
        } else {
            (source, target)
        };
        if let Some(owner_meta) = self.models.get_mut(owner) {
            if !owner_meta.has_column(&foreign_key) {
                owner_meta.fields.push(
                    FieldDef::new(
                        foreign_key.clone(),
                        FieldType::ForeignKey {
                            to: referenced.to_string(),
                        },
                    )
                    .nullable(),
                );
            }
        }

        tracing::trace!(source, target, name, foreign_key = %foreign_key, "association declared");
        self.associations.insert(
            key,
            Association {
                name: name.to_string(),
                source: source.to_string(),
                target: target.to_string(),
                kind,
                foreign_key,
            },
        );
        Ok(())
    }

    /// Builds a registry from a JSON schema document.
    ///
    /// ```json
    /// {
    ///   "models": [
    ///     {"name": "user", "table": "users", "timestamps": true,
    ///      "fields": [{"name": "amount", "type": "IntegerField"}]}
    ///   ],
    ///   "associations": [
    ///     {"source": "user", "target": "user", "as": "report", "kind": "has_one"}
    ///   ]
    /// }
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a serialization error for malformed documents and the
    /// registration errors of [`register`](Self::register) and
    /// [`associate`](Self::associate).
    pub fn from_json(json: &serde_json::Value) -> CteqlResult<Self> {
        let schema: SchemaDocument = serde_json::from_value(json.clone())
            .map_err(|e| CteqlError::SerializationError(format!("Invalid schema: {e}")))?;

        let mut registry = Self::new();
        for doc in schema.models {
            let mut model = if doc.auto_id {
                ModelMeta::new(doc.name, doc.table)
            } else {
                ModelMeta::bare(doc.name, doc.table)
            };
            for field in doc.fields {
                let mut def = FieldDef::new(field.name, field.field_type);
                if let Some(column) = field.column {
                    def = def.column(column);
                }
                def.primary_key = field.primary_key;
                def.null = field.null;
                model = model.with_field(def);
            }
            if doc.timestamps {
                model = model.with_timestamps();
            }
            registry.register(model)?;
        }
        for assoc in schema.associations {
            registry.associate(
                &assoc.source,
                &assoc.target,
                &assoc.name,
                assoc.kind,
                assoc.foreign_key.as_deref(),
            )?;
        }
        Ok(registry)
    }
}

/// Joins an alias and a key name camel-case style: `report` + `id` => `reportId`.
fn camel_key(prefix: &str, key: &str) -> String {
    let mut chars = key.chars();
    chars.next().map_or_else(
        || prefix.to_string(),
        |first| format!("{prefix}{}{}", first.to_uppercase(), chars.as_str()),
    )
}

#[derive(Debug, serde::Deserialize)]
struct SchemaDocument {
    #[serde(default)]
    models: Vec<ModelDocument>,
    #[serde(default)]
    associations: Vec<AssociationDocument>,
}

#[derive(Debug, serde::Deserialize)]
struct ModelDocument {
    name: String,
    table: String,
    #[serde(default = "default_true")]
    auto_id: bool,
    #[serde(default)]
    timestamps: bool,
    #[serde(default)]
    fields: Vec<FieldDocument>,
}

#[derive(Debug, serde::Deserialize)]
struct FieldDocument {
    name: String,
    column: Option<String>,
    #[serde(flatten)]
    field_type: FieldType,
    #[serde(default)]
    primary_key: bool,
    #[serde(default)]
    null: bool,
}

#[derive(Debug, serde::Deserialize)]
struct AssociationDocument {
    source: String,
    target: String,
    #[serde(rename = "as")]
    name: String,
    kind: AssociationKind,
    foreign_key: Option<String>,
}

const fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ModelRegistry {
        let mut reg = ModelRegistry::new();
        reg.register(
            ModelMeta::new("user", "users")
                .field("amount", FieldType::IntegerField)
                .with_timestamps(),
        )
        .unwrap();
        reg.register(
            ModelMeta::new("project", "projects")
                .field("name", FieldType::CharField)
                .with_timestamps(),
        )
        .unwrap();
        reg
    }

    #[test]
    fn test_has_one_default_key_added_to_target() {
        let mut reg = registry();
        reg.has_one("user", "user", "report").unwrap();
        let assoc = reg.association("user", "report").unwrap();
        assert_eq!(assoc.foreign_key, "reportId");
        let cols: Vec<&str> = reg.model("user").unwrap().columns().collect();
        assert_eq!(cols, vec!["id", "amount", "createdAt", "updatedAt", "reportId"]);
    }

    #[test]
    fn test_has_many_default_key_uses_source_name() {
        let mut reg = registry();
        reg.has_many("user", "project", "assigned").unwrap();
        assert_eq!(reg.association("user", "assigned").unwrap().foreign_key, "userId");
        assert!(reg.model("project").unwrap().has_column("userId"));
        assert!(!reg.model("user").unwrap().has_column("userId"));
    }

    #[test]
    fn test_belongs_to_key_on_source() {
        let mut reg = registry();
        reg.belongs_to("user", "user", "manager").unwrap();
        let assoc = reg.association("user", "manager").unwrap();
        assert_eq!(assoc.foreign_key, "managerId");
        let user = reg.model("user").unwrap();
        assert_eq!(assoc.join_columns(user, user), ("managerId", "id"));
    }

    #[test]
    fn test_join_columns_key_on_target() {
        let mut reg = registry();
        reg.has_one("user", "user", "report").unwrap();
        let user = reg.model("user").unwrap();
        let assoc = reg.association("user", "report").unwrap();
        assert_eq!(assoc.join_columns(user, user), ("id", "reportId"));
    }

    #[test]
    fn test_explicit_foreign_key() {
        let mut reg = registry();
        reg.associate("user", "user", "child", AssociationKind::HasMany, Some("parentId"))
            .unwrap();
        assert_eq!(reg.association("user", "child").unwrap().foreign_key, "parentId");
        assert!(reg.model("user").unwrap().has_column("parentId"));
    }

    #[test]
    fn test_existing_key_column_not_duplicated() {
        let mut reg = ModelRegistry::new();
        reg.register(ModelMeta::new("node", "nodes").field("parentId", FieldType::IntegerField))
            .unwrap();
        reg.has_many("node", "node", "children").unwrap();
        assert_eq!(reg.association("node", "children").unwrap().foreign_key, "nodeId");
        reg.associate("node", "node", "kids", AssociationKind::HasMany, Some("parentId"))
            .unwrap();
        let count = reg.model("node").unwrap().columns().filter(|c| *c == "parentId").count();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_unknown_association() {
        let reg = registry();
        let err = reg.association("user", "boss").unwrap_err();
        assert_eq!(err.code(), "unknown_association");
        assert_eq!(err.to_string(), "Unknown association 'boss' on model 'user'");
    }

    #[test]
    fn test_unknown_model() {
        let mut reg = registry();
        assert_eq!(reg.model("ghost").unwrap_err().code(), "unknown_model");
        assert_eq!(reg.has_one("user", "ghost", "x").unwrap_err().code(), "unknown_model");
    }

    #[test]
    fn test_duplicates_rejected() {
        let mut reg = registry();
        let err = reg.register(ModelMeta::new("user", "people")).unwrap_err();
        assert_eq!(err.code(), "duplicate_model");
        reg.has_one("user", "user", "report").unwrap();
        let err = reg.has_many("user", "project", "report").unwrap_err();
        assert_eq!(err.code(), "duplicate_association");
    }

    #[test]
    fn test_associations_of_sorted() {
        let mut reg = registry();
        reg.has_one("user", "user", "report").unwrap();
        reg.has_many("user", "project", "assigned").unwrap();
        let names: Vec<&str> = reg.associations_of("user").iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["assigned", "report"]);
        assert!(reg.associations_of("project").is_empty());
        assert_eq!(reg.model_names(), vec!["project", "user"]);
    }

    #[test]
    fn test_from_json_schema() {
        let reg = ModelRegistry::from_json(&serde_json::json!({
            "models": [
                {"name": "user", "table": "users", "timestamps": true,
                 "fields": [{"name": "amount", "type": "IntegerField"}]},
                {"name": "tag", "table": "tags", "auto_id": false,
                 "fields": [{"name": "code", "column": "tag_code", "type": "CharField", "primary_key": true}]}
            ],
            "associations": [
                {"source": "user", "target": "user", "as": "report", "kind": "has_one"}
            ]
        }))
        .unwrap();
        let cols: Vec<&str> = reg.model("user").unwrap().columns().collect();
        assert_eq!(cols, vec!["id", "amount", "createdAt", "updatedAt", "reportId"]);
        assert_eq!(reg.model("tag").unwrap().pk_column(), "tag_code");
    }

    #[test]
    fn test_from_json_malformed() {
        let err = ModelRegistry::from_json(&serde_json::json!({"models": [{"name": "x"}]}))
            .unwrap_err();
        assert_eq!(err.code(), "serialization");
    }

    #[test]
    fn test_camel_key() {
        assert_eq!(camel_key("report", "id"), "reportId");
        assert_eq!(camel_key("user", "uuid"), "userUuid");
        assert_eq!(camel_key("x", ""), "x");
    }
}
