//! Reading delimited text files into a [`Dataset`].
//!
//! Files ending in `.tsv` are read tab-separated, everything else
//! comma-separated. The named columns are cast to `f64`, checked for nulls and
//! non-finite values, and stacked as rows of the design and response matrices.
//! Text columns are treated as factors and replaced by the index of each value
//! among the column's sorted distinct levels.

use super::{DataError, Dataset};
use ndarray::Array2;
use polars::prelude::*;
use std::collections::{BTreeSet, HashSet};
use std::fs::File;
use std::path::Path;

/// Loads the `x_names` and `y_names` columns of a delimited file.
pub fn load_table(
    path: &Path,
    x_names: &[String],
    y_names: &[String],
) -> Result<Dataset, DataError> {
    let separator = match path.extension().and_then(|ext| ext.to_str()) {
        Some("tsv") => b'\t',
        _ => b',',
    };

    log::info!("Loading data from '{}'", path.display());
    let df = CsvReader::new(File::open(path)?)
        .with_options(
            CsvReadOptions::default()
                .with_has_header(true)
                .with_parse_options(CsvParseOptions::default().with_separator(separator)),
        )
        .finish()?;

    let columns_set: HashSet<String> = df
        .get_column_names()
        .into_iter()
        .map(|s| s.to_string())
        .collect();
    for name in x_names.iter().chain(y_names) {
        if !columns_set.contains(name) {
            return Err(DataError::ColumnNotFound(name.clone()));
        }
    }

    let x = stack_columns(&df, x_names)?;
    let y = stack_columns(&df, y_names)?;
    println!(
        "Successfully loaded dataset: X -> {:?} | y -> {:?}",
        x.shape(),
        y.shape()
    );

    Ok(Dataset {
        x,
        y,
        x_names: x_names.to_vec(),
        y_names: y_names.to_vec(),
    })
}

/// Builds a `[names.len(), height]` matrix, one row per named column.
fn stack_columns(df: &DataFrame, names: &[String]) -> Result<Array2<f64>, DataError> {
    let mut buffer = Vec::with_capacity(names.len() * df.height());
    for name in names {
        buffer.append(&mut extract_numeric_column(df, name)?);
    }
    Ok(Array2::from_shape_vec((names.len(), df.height()), buffer)?)
}

/// Replaces each text value by its position among the sorted distinct levels.
fn level_codes(column_name: &str, values: &StringChunked) -> Vec<f64> {
    let levels: Vec<&str> = values
        .into_iter()
        .flatten()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    log::info!("Encoding text column '{column_name}' with levels {levels:?}");
    values
        .into_iter()
        .flatten()
        .map(|value| levels.binary_search(&value).map_or(f64::NAN, |code| code as f64))
        .collect()
}

fn extract_numeric_column(df: &DataFrame, column_name: &str) -> Result<Vec<f64>, DataError> {
    let series = df.column(column_name)?;
    if series.null_count() > 0 {
        return Err(DataError::MissingValuesFound(column_name.to_string()));
    }

    if series.dtype() == &DataType::String {
        return Ok(level_codes(column_name, series.str()?));
    }

    let wrong_type = || DataError::ColumnWrongType {
        column_name: column_name.to_string(),
        found_type: format!("{:?}", series.dtype()),
    };
    let casted = series.cast(&DataType::Float64).map_err(|_| wrong_type())?;
    // A failed string-to-number cast shows up as nulls rather than an error.
    if casted.null_count() > 0 {
        return Err(wrong_type());
    }

    let chunked = casted.f64()?.rechunk();
    let values: Vec<f64> = chunked.into_no_null_iter().collect();
    if values.iter().any(|v| !v.is_finite()) {
        return Err(DataError::NonFiniteValuesFound(column_name.to_string()));
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::io::{self, Write};
    use tempfile::{Builder, NamedTempFile};

    fn write_fixture(suffix: &str, content: &str) -> io::Result<NamedTempFile> {
        let mut file = Builder::new().suffix(suffix).tempfile()?;
        writeln!(file, "{content}")?;
        file.flush()?;
        Ok(file)
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn csv_columns_become_rows() {
        let file = write_fixture(
            ".csv",
            "income,education,prestige,type\n62,86,82,prof\n72,76,83,prof\n75,92,90,prof",
        )
        .unwrap();
        let data = load_table(
            file.path(),
            &names(&["education", "prestige"]),
            &names(&["income"]),
        )
        .unwrap();

        assert_eq!(data.x.shape(), &[2, 3]);
        assert_eq!(data.y.shape(), &[1, 3]);
        assert_abs_diff_eq!(data.x[[0, 1]], 76.0, epsilon = 1e-12);
        assert_abs_diff_eq!(data.x[[1, 2]], 90.0, epsilon = 1e-12);
        assert_abs_diff_eq!(data.y[[0, 0]], 62.0, epsilon = 1e-12);
    }

    #[test]
    fn tsv_extension_switches_the_separator() {
        let file = write_fixture(".tsv", "breaks\twool\n26\t1\n30\t2").unwrap();
        let data = load_table(file.path(), &names(&["wool"]), &names(&["breaks"])).unwrap();
        assert_eq!(data.x.shape(), &[1, 2]);
        assert_abs_diff_eq!(data.y[[0, 1]], 30.0, epsilon = 1e-12);
    }

    #[test]
    fn text_columns_become_sorted_level_codes() {
        let file = write_fixture(
            ".csv",
            "breaks,wool,tension\n26,A,L\n30,A,M\n54,A,H\n25,B,L\n70,B,M\n52,B,H",
        )
        .unwrap();
        let data = load_table(
            file.path(),
            &names(&["wool", "tension"]),
            &names(&["breaks"]),
        )
        .unwrap();

        assert_eq!(data.x.shape(), &[2, 6]);
        assert_eq!(data.x.row(0).to_vec(), vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0]);
        // Levels sort as H, L, M.
        assert_eq!(data.x.row(1).to_vec(), vec![1.0, 2.0, 0.0, 1.0, 2.0, 0.0]);
        assert_eq!(data.y.row(0).to_vec(), vec![26.0, 30.0, 54.0, 25.0, 70.0, 52.0]);
    }

    #[test]
    fn missing_column_is_named_in_the_error() {
        let file = write_fixture(".csv", "a,b\n1,2\n3,4").unwrap();
        let err = load_table(file.path(), &names(&["a"]), &names(&["GRADE"])).unwrap_err();
        match err {
            DataError::ColumnNotFound(col) => assert_eq!(col, "GRADE"),
            other => panic!("Expected ColumnNotFound(GRADE), got {other:?}"),
        }
    }

    #[test]
    fn empty_cell_is_reported_as_missing() {
        let file = write_fixture(".csv", "y,x\n1,2\n0,").unwrap();
        let err = load_table(file.path(), &names(&["x"]), &names(&["y"])).unwrap_err();
        assert!(matches!(err, DataError::MissingValuesFound(col) if col == "x"));
    }
}
