//! Delimited-text survey reader.
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use csv::StringRecord;
use ndarray::Array2;

use crate::data_handling::SurveyTable;

/// Configuration for reading a survey export.
#[derive(Debug, Clone)]
pub struct SurveyReaderConfig {
    /// Field delimiter. When `None` it is inferred from the extension:
    /// `.tsv`/`.tab`/`.txt` use tabs, everything else commas.
    pub delimiter: Option<u8>,
    /// Optional column holding subject identifiers; kept as row ids and
    /// excluded from the numeric table.
    pub id_column: Option<String>,
    /// Cell values read as missing.
    pub missing_tokens: Vec<String>,
}

impl Default for SurveyReaderConfig {
    fn default() -> Self {
        Self {
            delimiter: None,
            id_column: None,
            missing_tokens: vec![
                "".to_string(),
                "NA".to_string(),
                "NaN".to_string(),
                "nan".to_string(),
                "null".to_string(),
                ".".to_string(),
            ],
        }
    }
}

/// Read a delimited survey table. Every column other than the id column
/// must be numeric; missing cells become NaN.
pub fn read_survey_table<P: AsRef<Path>>(path: P, config: &SurveyReaderConfig) -> Result<SurveyTable> {
    let path = path.as_ref();
    let delimiter = config.delimiter.unwrap_or_else(|| infer_delimiter(path));
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("Failed to open survey file: {}", path.display()))?;

    let headers = reader
        .headers()
        .context("Failed to read survey header row")?
        .clone();

    let id_idx = match &config.id_column {
        Some(name) => Some(
            find_column(&headers, name).ok_or_else(|| anyhow!("Missing id column '{}'", name))?,
        ),
        None => None,
    };
    let value_indices: Vec<usize> = (0..headers.len()).filter(|&i| Some(i) != id_idx).collect();
    if value_indices.is_empty() {
        return Err(anyhow!("No value columns in {}", path.display()));
    }
    let columns: Vec<String> = value_indices
        .iter()
        .map(|&i| headers.get(i).unwrap_or("").trim().to_string())
        .collect();

    let mut values = Vec::new();
    let mut row_ids = Vec::new();
    for (row_idx, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("Failed to read row {}", row_idx + 1))?;

        let row_id = match id_idx {
            Some(idx) => record.get(idx).unwrap_or_default().trim().to_string(),
            None => row_idx.to_string(),
        };
        row_ids.push(row_id);

        for &idx in &value_indices {
            let raw = record.get(idx).unwrap_or_default().trim();
            values.push(parse_cell(raw, &config.missing_tokens).with_context(|| {
                format!(
                    "Invalid value '{}' in column '{}' at row {}",
                    raw,
                    headers.get(idx).unwrap_or(""),
                    row_idx + 1
                )
            })?);
        }
    }

    let data = Array2::from_shape_vec((row_ids.len(), columns.len()), values)
        .context("Failed to build survey matrix")?;
    log::info!(
        "loaded {} rows x {} columns from {}",
        data.nrows(),
        data.ncols(),
        path.display()
    );
    SurveyTable::with_row_ids(columns, data, row_ids).context("Failed to build survey table")
}

fn infer_delimiter(path: &Path) -> u8 {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("tsv") | Some("tab") | Some("txt") => b'\t',
        _ => b',',
    }
}

fn parse_cell(raw: &str, missing_tokens: &[String]) -> Result<f64> {
    if missing_tokens.iter().any(|t| t == raw) {
        return Ok(f64::NAN);
    }
    Ok(raw.parse::<f64>()?)
}

fn find_column(headers: &StringRecord, name: &str) -> Option<usize> {
    headers
        .iter()
        .position(|header| header.trim().eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &tempfile::TempDir, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn reads_csv_with_missing_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "survey.csv", "q1,q2,dx\n1,0,2\n2,NA,0\n0,1,\n");
        let table = read_survey_table(&path, &SurveyReaderConfig::default()).unwrap();
        assert_eq!(table.nrows(), 3);
        assert_eq!(table.columns(), &["q1", "q2", "dx"]);
        assert!(table.column("q2").unwrap()[1].is_nan());
        assert!(table.column("dx").unwrap()[2].is_nan());
        assert_eq!(table.column("dx").unwrap()[0], 2.0);
    }

    #[test]
    fn tsv_with_id_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "survey.tsv", "ID\tq1\tdx\nA01\t1\t0\nA02\t3\t1\n");
        let config = SurveyReaderConfig {
            id_column: Some("id".to_string()),
            ..Default::default()
        };
        let table = read_survey_table(&path, &config).unwrap();
        assert_eq!(table.columns(), &["q1", "dx"]);
        assert_eq!(table.row_ids(), &["A01", "A02"]);
    }

    #[test]
    fn non_numeric_cell_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "bad.csv", "q1,dx\nyes,0\n");
        let err = read_survey_table(&path, &SurveyReaderConfig::default()).unwrap_err();
        assert!(format!("{:#}", err).contains("column 'q1'"));
    }
}
