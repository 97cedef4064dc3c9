//! Reflection of a live database schema.
//!
//! The engine only reads tables through [SchemaProvider]; [Schema] is the
//! serde-loadable implementation, produced from a JSON/YAML file or from
//! introspecting a database (see [crate::exec::sqlite::introspect]).

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::catalog::{TypeCatalog, TypeInfo};
use crate::relation::TypeOptions;

/// Source of table definitions.
pub trait SchemaProvider {
    /// Looks a table up, either by its bare name or as `schema.table`.
    fn table(&self, name: &str) -> Option<&Table>;

    /// Names of all tables, used for hints in errors.
    fn table_names(&self) -> Vec<String>;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Schema {
    #[serde(default)]
    pub tables: Vec<Table>,
    /// Types defined in the database on top of the builtin catalog.
    #[serde(default)]
    pub types: Vec<TypeInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Table {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    pub name: String,
    pub columns: Vec<TableColumn>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TableColumn {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub type_options: TypeOptions,
    /// Presentation settings stored by the front end; passed through as is.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_options: Option<serde_json::Value>,
    #[serde(default)]
    pub primary_key: bool,
}

impl Table {
    pub fn column(&self, name: &str) -> Option<&TableColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Name used in the FROM clause.
    pub fn qualified_name(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{schema}.{}", self.name),
            None => self.name.clone(),
        }
    }
}

impl Schema {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    #[cfg(feature = "serde_yaml")]
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Builtin catalog extended with the types this schema declares.
    pub fn catalog(&self) -> TypeCatalog {
        TypeCatalog::builtin().with_types(self.types.iter().cloned())
    }
}

impl SchemaProvider for Schema {
    fn table(&self, name: &str) -> Option<&Table> {
        self.tables
            .iter()
            .find(|t| t.qualified_name() == name)
            .or_else(|| self.tables.iter().find(|t| t.name == name))
    }

    fn table_names(&self) -> Vec<String> {
        self.tables.iter().map(Table::qualified_name).collect()
    }
}
