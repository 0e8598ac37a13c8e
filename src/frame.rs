//! Data frame helpers shared by every preprocessing stage.
//!
//! Stages pass `polars` [`DataFrame`]s between each other. Numeric columns
//! are widened to `f64` when read, categorical columns stay `String` until
//! the encoder replaces them with indicator columns.

use crate::error::{PipelineError, Result};
use polars::prelude::*;
use std::fs::{self, File};
use std::path::Path;

/// Column names, in frame order
pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names().iter().map(|s| s.to_string()).collect()
}

pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_index(name).is_some()
}

/// A `Float64` column
pub fn float_column(name: &str, values: Vec<f64>) -> Column {
    Series::new(name.into(), values).into()
}

/// Whether the named column holds raw strings
pub fn is_categorical(df: &DataFrame, name: &str) -> bool {
    df.column(name)
        .map(|c| c.dtype() == &DataType::String)
        .unwrap_or(false)
}

/// Values of a numeric column as `f64`. Missing values are rejected.
pub fn numeric_values(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let column = df
        .column(name)
        .map_err(|_| PipelineError::Schema(format!("missing column '{}'", name)))?;
    let series = column.as_materialized_series();
    if series.dtype() == &DataType::String {
        return Err(PipelineError::Schema(format!(
            "column '{}' is not numeric",
            name
        )));
    }

    let widened = series.cast(&DataType::Float64)?;
    widened
        .f64()?
        .into_iter()
        .enumerate()
        .map(|(row, value)| {
            value.ok_or_else(|| {
                PipelineError::Validation(format!("column '{}' is empty at row {}", name, row))
            })
        })
        .collect()
}

/// Project to the given columns in the given order.
/// Every missing column is reported, none are filled in.
pub fn select_columns(df: &DataFrame, names: &[String]) -> Result<DataFrame> {
    let missing: Vec<&str> = names
        .iter()
        .filter(|n| !has_column(df, n))
        .map(String::as_str)
        .collect();
    if !missing.is_empty() {
        return Err(PipelineError::Schema(format!(
            "missing required column(s): {}",
            missing.join(", ")
        )));
    }
    Ok(df.select(names.iter().map(String::as_str))?)
}

/// Drop the named columns; names that are absent are ignored
pub fn drop_columns(df: &DataFrame, names: &[&str]) -> Result<DataFrame> {
    let kept: Vec<String> = column_names(df)
        .into_iter()
        .filter(|n| !names.contains(&n.as_str()))
        .collect();
    Ok(df.select(kept)?)
}

/// New frame holding the given rows, in the given order
pub fn take_rows(df: &DataFrame, rows: &[usize]) -> Result<DataFrame> {
    let indices = rows
        .iter()
        .map(|&row| {
            IdxSize::try_from(row)
                .map_err(|_| PipelineError::Validation(format!("row index {} out of range", row)))
        })
        .collect::<Result<Vec<IdxSize>>>()?;
    Ok(df.take(&IdxCa::from_vec("idx".into(), indices))?)
}

/// Row-major `f32` matrix for model input. Every column must be numeric.
pub fn to_feature_rows(df: &DataFrame) -> Result<Vec<Vec<f32>>> {
    let columns = column_names(df)
        .iter()
        .map(|name| numeric_values(df, name))
        .collect::<Result<Vec<_>>>()?;

    Ok((0..df.height())
        .map(|row| columns.iter().map(|values| values[row] as f32).collect())
        .collect())
}

/// Read a CSV file with a header row. The whole file is scanned for the
/// schema, so a column turns numeric only if every value parses.
pub fn read_csv<P: AsRef<Path>>(path: P) -> Result<DataFrame> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| PipelineError::io(path, e))?;

    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(None)
        .into_reader_with_file_handle(file)
        .finish()
        .map_err(|e| PipelineError::malformed(path, e))
}

/// Write the frame as CSV with a header row, creating parent directories
pub fn write_csv<P: AsRef<Path>>(df: &mut DataFrame, path: P) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
    }
    let mut file = File::create(path).map_err(|e| PipelineError::io(path, e))?;

    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(df)
        .map_err(|e| PipelineError::malformed(path, e))
}
