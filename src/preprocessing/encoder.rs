//! One-hot encoding of categorical columns

use crate::error::{PipelineError, Result};
use crate::frame::{float_column, has_column};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Categories of one source column, in indicator-column order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryMapping {
    pub column: String,
    pub categories: Vec<String>,
}

impl CategoryMapping {
    /// Indicator column name for a category, e.g. `type_TRANSFER`
    pub fn indicator_name(&self, category: &str) -> String {
        format!("{}_{}", self.column, category)
    }

    pub fn indicator_names(&self) -> Vec<String> {
        self.categories
            .iter()
            .map(|c| self.indicator_name(c))
            .collect()
    }

    fn encode(&self, values: &StringChunked) -> Vec<Column> {
        self.categories
            .iter()
            .map(|category| {
                let indicator = values
                    .into_iter()
                    .map(|v| if v == Some(category.as_str()) { 1.0 } else { 0.0 })
                    .collect();
                float_column(&self.indicator_name(category), indicator)
            })
            .collect()
    }
}

/// Fitted one-hot mapping. Immutable once fitted; every partition and
/// every inference request is transformed with the same state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodingState {
    pub mappings: Vec<CategoryMapping>,
}

impl EncodingState {
    /// Learn the distinct values of each categorical column.
    ///
    /// Categories are sorted, so the fitted state does not depend on the
    /// order of the training rows.
    pub fn fit(df: &DataFrame, columns: &[String]) -> Result<Self> {
        if df.height() == 0 {
            return Err(PipelineError::Validation(
                "cannot fit encoder on an empty partition".to_string(),
            ));
        }

        let mappings = columns
            .iter()
            .map(|name| {
                let values = categorical(df, name)?;
                let categories: BTreeSet<&str> = values.into_iter().flatten().collect();
                Ok(CategoryMapping {
                    column: name.clone(),
                    categories: categories.into_iter().map(String::from).collect(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { mappings })
    }

    /// Replace each categorical column with its indicator columns, at the
    /// source column's position.
    ///
    /// Exactly one indicator is 1 per row; a category unseen at fit time
    /// produces an all-zero row.
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        let mut out = df.clone();
        for mapping in &self.mappings {
            let values = categorical(df, &mapping.column).map_err(|e| {
                if mapping.indicator_names().iter().any(|n| has_column(df, n)) {
                    PipelineError::Validation(format!(
                        "column '{}' is already one-hot encoded",
                        mapping.column
                    ))
                } else {
                    e
                }
            })?;

            let position = out.get_column_index(&mapping.column).ok_or_else(|| {
                PipelineError::Validation(format!(
                    "missing categorical column '{}'",
                    mapping.column
                ))
            })?;
            let indicators = mapping.encode(values);
            out.drop_in_place(&mapping.column)?;
            for (offset, indicator) in indicators.into_iter().enumerate() {
                out.insert_column(position + offset, indicator)?;
            }
        }
        Ok(out)
    }

    /// All indicator column names, in output order
    pub fn indicator_columns(&self) -> Vec<String> {
        self.mappings
            .iter()
            .flat_map(CategoryMapping::indicator_names)
            .collect()
    }

    /// Source columns this state encodes
    pub fn source_columns(&self) -> Vec<&str> {
        self.mappings.iter().map(|m| m.column.as_str()).collect()
    }
}

fn categorical<'a>(df: &'a DataFrame, name: &str) -> Result<&'a StringChunked> {
    let column = df.column(name).map_err(|_| {
        PipelineError::Validation(format!("missing categorical column '{}'", name))
    })?;
    column
        .as_materialized_series()
        .str()
        .map_err(|_| PipelineError::Validation(format!("column '{}' is not categorical", name)))
}
