//! Writing result tables to disk.

use std::fs::File;
use std::path::Path;

use log::debug;
use polars::prelude::*;

use crate::error::{
    HomologyError,
    Result,
};

/// Output layout chosen from a file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Csv,
    Tsv,
}

impl TableFormat {
    /// `.csv` is comma separated, `.xlsx`/`.xls` are rejected and anything
    /// else is written tab separated.
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        match extension.as_str() {
            "csv" => Ok(TableFormat::Csv),
            "xlsx" | "xls" => {
                Err(HomologyError::Config(format!(
                    "spreadsheet output is not supported, use .csv or .tsv instead of {}",
                    path.display()
                )))
            },
            _ => Ok(TableFormat::Tsv),
        }
    }

    pub fn separator(&self) -> u8 {
        match self {
            TableFormat::Csv => b',',
            TableFormat::Tsv => b'\t',
        }
    }
}

/// Writes `df` with a header row, creating missing parent directories.
pub fn write_table(
    df: &mut DataFrame,
    path: &Path,
) -> Result<()> {
    let format = TableFormat::from_path(path)?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    debug!("Writing {} rows to {} as {:?}", df.height(), path.display(), format);
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .with_separator(format.separator())
        .finish(df)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("hits.csv", Some(TableFormat::Csv))]
    #[case("hits.CSV", Some(TableFormat::Csv))]
    #[case("hits.tsv", Some(TableFormat::Tsv))]
    #[case("hits", Some(TableFormat::Tsv))]
    #[case("hits.xlsx", None)]
    fn format_from_extension(
        #[case] path: &str,
        #[case] expected: Option<TableFormat>,
    ) {
        assert_eq!(TableFormat::from_path(Path::new(path)).ok(), expected);
    }

    #[test]
    fn writes_csv_with_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/hits.csv");
        let mut df = df!("Query_ID" => ["a", "b"], "Bit_Score" => [1.5, 2.0]).unwrap();
        write_table(&mut df, &path).unwrap();
        let text = std::fs::read_to_string(path).unwrap();
        let lines = text.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "Query_ID,Bit_Score");
        assert_eq!(lines[1], "a,1.5");
    }
}
