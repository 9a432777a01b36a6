use serde::{Deserialize, Serialize};

/// Identity of a table: `dataset.table`, or a bare name without a dataset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableRef {
    pub dataset: Option<String>,
    pub table: String,
}

impl TableRef {
    pub fn new(dataset: &str, table: &str) -> Self {
        Self {
            dataset: (!dataset.is_empty()).then(|| dataset.to_string()),
            table: table.to_string(),
        }
    }

    pub fn bare(table: &str) -> Self {
        Self {
            dataset: None,
            table: table.to_string(),
        }
    }

    /// Parse `dataset.table` (or a bare table name).
    pub fn parse(identity: &str) -> Self {
        match identity.rsplit_once('.') {
            Some((dataset, table)) => Self::new(dataset, table),
            None => Self::bare(identity),
        }
    }

    /// Same table in the output dataset `<dataset><suffix>`.
    pub fn output(&self, suffix: &str) -> Self {
        Self {
            dataset: self.dataset.as_ref().map(|d| format!("{}{}", d, suffix)),
            table: self.table.clone(),
        }
    }

    pub fn dataset_or_empty(&self) -> &str {
        self.dataset.as_deref().unwrap_or("")
    }
}

impl std::fmt::Display for TableRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.dataset {
            Some(dataset) => write!(f, "{}.{}", dataset, self.table),
            None => write!(f, "{}", self.table),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity() {
        let table = TableRef::new("synpuf", "person");
        assert_eq!(table.to_string(), "synpuf.person");
        assert_eq!(table.output("_deid").to_string(), "synpuf_deid.person");
        assert_eq!(TableRef::new("", "person").to_string(), "person");
        assert_eq!(TableRef::parse("synpuf.observation"), TableRef::new("synpuf", "observation"));
    }
}
