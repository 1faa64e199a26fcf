//! Table names, schema and statement builders
//!
//! Table names are spliced into SQL text, so they are validated once when
//! [`Tables`] is built and never touched again.

use crate::error::{Error, Result};
use crate::warehouse::is_valid_table_name;

pub mod queries;
pub mod schema;

/// Validated table names used by every statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tables {
    source: String,
    evaluation: String,
    recommendations: String,
}

impl Tables {
    pub fn new(source: &str, evaluation: &str) -> Result<Self> {
        for name in [source, evaluation] {
            if !is_valid_table_name(name) {
                return Err(Error::Config(format!("Invalid table name: {:?}", name)));
            }
        }

        Ok(Self {
            source: source.to_string(),
            evaluation: evaluation.to_string(),
            recommendations: format!("{}_recommendations", evaluation),
        })
    }

    /// Flattened LLM output table
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Human evaluation table
    pub fn evaluation(&self) -> &str {
        &self.evaluation
    }

    pub fn recommendations(&self) -> &str {
        &self.recommendations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recommendations_name_follows_evaluation() {
        let tables = Tables::new("main.ge.scores", "main.ge.scores_evaluation").unwrap();
        assert_eq!(tables.recommendations(), "main.ge.scores_evaluation_recommendations");
    }

    #[test]
    fn test_rejects_injection() {
        assert!(Tables::new("scores", "scores_eval WHERE 1=1").is_err());
        assert!(Tables::new("scores--", "scores_eval").is_err());
    }
}
