//! Table schemas: the ordered column list the assembler passes through.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::ast::TableRef;
use crate::error::{DeidError, DeidResult};

/// One field of a table definition file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    #[serde(rename = "type", default)]
    pub field_type: String,
    #[serde(default)]
    pub mode: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Source of table schemas.
pub trait SchemaProvider {
    /// Field definitions of a table, in schema order.
    fn fields(&self, table: &TableRef) -> DeidResult<Vec<FieldDefinition>>;

    /// Column names of a table, in schema order.
    fn columns(&self, table: &TableRef) -> DeidResult<Vec<String>> {
        Ok(self
            .fields(table)?
            .into_iter()
            .map(|field| field.name)
            .collect())
    }
}

/// Reads `<dir>/<table>.json` field lists.
#[derive(Debug, Clone)]
pub struct JsonSchemaProvider {
    dir: PathBuf,
}

impl JsonSchemaProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, table: &TableRef) -> PathBuf {
        self.dir.join(format!("{}.json", table.table))
    }
}

impl SchemaProvider for JsonSchemaProvider {
    fn fields(&self, table: &TableRef) -> DeidResult<Vec<FieldDefinition>> {
        let path = self.path_for(table);
        let text = std::fs::read_to_string(&path).map_err(|e| {
            DeidError::Config(format!("no schema for {} at {}: {}", table, path.display(), e))
        })?;
        let fields: Vec<FieldDefinition> = serde_json::from_str(&text)?;
        if fields.is_empty() {
            return Err(DeidError::Config(format!("schema for {} has no fields", table)));
        }
        Ok(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_columns_in_schema_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("person.json"),
            r#"[
                {"name": "person_id", "type": "integer", "mode": "required"},
                {"name": "ssn", "type": "string", "mode": "nullable", "description": "social security number"},
                {"name": "birth_date", "type": "date", "mode": "nullable"}
            ]"#,
        )
        .unwrap();

        let provider = JsonSchemaProvider::new(dir.path());
        let table = TableRef::new("synpuf", "person");
        assert_eq!(provider.columns(&table).unwrap(), vec!["person_id", "ssn", "birth_date"]);
        assert_eq!(provider.fields(&table).unwrap()[1].field_type, "string");
    }

    #[test]
    fn test_missing_schema() {
        let dir = tempfile::tempdir().unwrap();
        let provider = JsonSchemaProvider::new(dir.path());
        let err = provider.columns(&TableRef::bare("nowhere")).unwrap_err();
        assert!(matches!(err, DeidError::Config(_)));
    }
}
