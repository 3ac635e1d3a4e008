//! JSON configuration for a [`QueryTemplates`] store.
//!
//! ```json
//! {
//!   "paging_supported": false,
//!   "constraint_error_patterns": ["constraint \"(?<name>\\w+)\""],
//!   "queries": {
//!     "#commonCode": "{% macro col(f) %}\"{{ f }}\"{% endmacro %}",
//!     "dropTableTemplate": "DROP TABLE {{ table }}",
//!     "createIndexTemplate": {
//!       "steps": [
//!         { "template": "CREATE INDEX ...", "ignore_on_error": true }
//!       ]
//!     }
//!   }
//! }
//! ```

use crate::store::{DialectFlags, Query, QueryStep, QueryTemplates};
use lazyorm_core::{ConfigError, Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Deserialized form of a dialect's query configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryTemplatesConfig {
    #[serde(flatten)]
    pub flags: DialectFlags,
    pub constraint_error_patterns: Vec<String>,
    pub queries: BTreeMap<String, QueryConfig>,
}

/// A query given either as a bare template or as explicit steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryConfig {
    Template(String),
    Steps { steps: Vec<StepConfig> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepConfig {
    pub template: String,
    #[serde(default)]
    pub ignore_on_error: bool,
}

impl QueryTemplatesConfig {
    /// Parse a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| {
            Error::Config(ConfigError {
                message: format!("invalid query configuration: {e}"),
                source: Some(Box::new(e)),
            })
        })
    }

    /// Build a store rendering through the default engine. The store is not
    /// validated.
    pub fn into_templates(self) -> Result<QueryTemplates> {
        let mut templates = QueryTemplates::new().flags(self.flags);

        for pattern in &self.constraint_error_patterns {
            templates.add_constraint_error_pattern(pattern)?;
        }

        for (name, query) in self.queries {
            let query = match query {
                QueryConfig::Template(template) => Query::new(name, template),
                QueryConfig::Steps { steps } => {
                    steps.into_iter().fold(Query::empty(name), |query, step| {
                        query.step(QueryStep::new(step.template).ignore_on_error(step.ignore_on_error))
                    })
                }
            };
            templates.add_query(query);
        }

        Ok(templates)
    }
}

impl QueryTemplates {
    /// Load and validate a store from a JSON configuration document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let mut templates = QueryTemplatesConfig::from_json_str(json)?.into_templates()?;
        templates.validate()?;
        tracing::debug!(
            queries = templates.query_names().len(),
            "Loaded query templates"
        );
        Ok(templates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_both_query_forms() {
        let config = QueryTemplatesConfig::from_json_str(
            r#"{
                "lower_case_names": true,
                "queries": {
                    "a": "SELECT 1",
                    "b": { "steps": [
                        { "template": "x" },
                        { "template": "y", "ignore_on_error": true }
                    ] }
                }
            }"#,
        )
        .unwrap();

        assert!(config.flags.paging_supported);
        assert!(config.flags.lower_case_names);
        assert_eq!(config.queries["a"], QueryConfig::Template("SELECT 1".into()));
        match &config.queries["b"] {
            QueryConfig::Steps { steps } => {
                assert_eq!(steps.len(), 2);
                assert!(!steps[0].ignore_on_error);
                assert!(steps[1].ignore_on_error);
            }
            other => panic!("expected steps, got {other:?}"),
        }
    }

    #[test]
    fn malformed_json_is_config_error() {
        let err = QueryTemplatesConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn bad_pattern_fails_conversion() {
        let config = QueryTemplatesConfig {
            constraint_error_patterns: vec!["no group here".to_string()],
            ..QueryTemplatesConfig::default()
        };
        assert!(config.into_templates().is_err());
    }
}
