//! Lookups in the precomputed cotton to *Arabidopsis* homology tables.
//!
//! Each cotton assembly may ship a table of `(Query, Match, Description)`
//! rows where `Query` is a cotton id and `Match` an *Arabidopsis* id. Input
//! ids are resolved leniently: when the sampled ids match the table in
//! neither form, the lookup goes ahead with the ids as given.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{
    anyhow,
    bail,
    Context,
};
use itertools::Itertools;
use log::{
    debug,
    info,
    warn,
};
use polars::prelude::*;
use rusqlite::{
    params_from_iter,
    Connection,
    OpenFlags,
};
use serde::{
    Deserialize,
    Serialize,
};

use crate::config::{
    ResolutionConfig,
    ToolkitConfig,
};
use crate::error::{
    HomologyError,
    Result,
};
use crate::ids::to_base_gene;
use crate::resolve::{
    IdProbe,
    IdentityResolver,
    ResolutionPolicy,
};
use crate::task::{
    CancelToken,
    ProgressSink,
};

pub const COTTON_ID: &str = "Cotton_ID";
pub const ARABIDOPSIS_ID: &str = "Arabidopsis_ID";
pub const DESCRIPTION: &str = "Description";

const BATCH_SIZE: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionDirection {
    CottonToAth,
    AthToCotton,
}

impl ConversionDirection {
    /// Header of the lookup table for this direction.
    pub fn columns(&self) -> [&'static str; 3] {
        match self {
            ConversionDirection::CottonToAth => [COTTON_ID, ARABIDOPSIS_ID, DESCRIPTION],
            ConversionDirection::AthToCotton => [ARABIDOPSIS_ID, COTTON_ID, DESCRIPTION],
        }
    }
}

impl std::str::FromStr for ConversionDirection {
    type Err = HomologyError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "cotton_to_ath" => Ok(ConversionDirection::CottonToAth),
            "ath_to_cotton" => Ok(ConversionDirection::AthToCotton),
            other => {
                Err(HomologyError::Config(format!(
                    "unknown conversion direction '{}'",
                    other
                )))
            },
        }
    }
}

/// One stored homology relation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrthologRecord {
    pub query:       String,
    pub matched:     String,
    pub description: Option<String>,
}

/// Source of precomputed cotton/*Arabidopsis* relations.
pub trait OrthologTable: Send + Sync {
    /// Relations whose cotton id equals one of `ids` (`CottonToAth`) or
    /// whose *Arabidopsis* id starts with the base form of one of `ids`
    /// (`AthToCotton`).
    fn relations(
        &self,
        assembly: &str,
        direction: ConversionDirection,
        ids: &[String],
    ) -> anyhow::Result<Vec<OrthologRecord>>;

    /// Whether `id` occurs in the column searched for `direction`.
    fn id_exists(
        &self,
        assembly: &str,
        direction: ConversionDirection,
        id: &str,
    ) -> anyhow::Result<bool>;
}

struct DirectionProbe<'a> {
    table:     &'a dyn OrthologTable,
    direction: ConversionDirection,
}

impl IdProbe for DirectionProbe<'_> {
    fn id_exists(
        &self,
        assembly: &str,
        id: &str,
    ) -> anyhow::Result<bool> {
        self.table.id_exists(assembly, self.direction, id)
    }
}

/// Looks `gene_ids` up in the homology table of `assembly`.
///
/// Ids are resolved against the searched column with
/// [`ResolutionPolicy::PassThrough`], then sorted and deduplicated. The
/// returned table carries the columns of [`ConversionDirection::columns`]
/// and has zero rows when nothing matched. `Ok(None)` means the run was
/// cancelled.
pub fn lookup_orthologs(
    table: &dyn OrthologTable,
    resolution: &ResolutionConfig,
    assembly: &str,
    gene_ids: &[String],
    direction: ConversionDirection,
    cancel: &CancelToken,
    progress: &dyn ProgressSink,
) -> Result<Option<DataFrame>> {
    progress.report(0, "Preparing ortholog lookup");
    if cancel.is_cancelled() {
        return Ok(None);
    }

    progress.report(5, "Resolving gene ids");
    let probe = DirectionProbe { table, direction };
    let resolved = IdentityResolver::with_probe(&probe, resolution).resolve(
        assembly,
        gene_ids,
        ResolutionPolicy::PassThrough,
    )?;
    let query_ids = resolved
        .ids
        .into_iter()
        .sorted()
        .dedup()
        .collect_vec();
    if query_ids.is_empty() {
        return Err(HomologyError::EmptyInput);
    }
    debug!("Ortholog lookup of {} ids as {:?}", query_ids.len(), resolved.mode);

    progress.report(20, "Querying homology table");
    if cancel.is_cancelled() {
        return Ok(None);
    }
    let records = table
        .relations(assembly, direction, &query_ids)
        .map_err(HomologyError::Store)?;
    if cancel.is_cancelled() {
        return Ok(None);
    }

    progress.report(80, "Collecting relations");
    if records.is_empty() {
        warn!("No homology relations found for {} ids in {}", query_ids.len(), assembly);
    }
    else {
        info!("Found {} homology relations in {}", records.len(), assembly);
    }
    let df = records_to_frame(&records, direction)?;
    progress.report(100, "Ortholog lookup finished");
    Ok(Some(df))
}

fn records_to_frame(
    records: &[OrthologRecord],
    direction: ConversionDirection,
) -> PolarsResult<DataFrame> {
    let cotton = records
        .iter()
        .map(|r| r.query.as_str())
        .collect_vec();
    let arabidopsis = records
        .iter()
        .map(|r| r.matched.as_str())
        .collect_vec();
    let description = records
        .iter()
        .map(|r| r.description.as_deref())
        .collect_vec();

    let [first, second, _] = direction.columns();
    let (first_values, second_values) = match direction {
        ConversionDirection::CottonToAth => (cotton, arabidopsis),
        ConversionDirection::AthToCotton => (arabidopsis, cotton),
    };
    DataFrame::new(vec![
        Column::new(first.into(), first_values),
        Column::new(second.into(), second_values),
        Column::new(DESCRIPTION.into(), description),
    ])
}

/// [`OrthologTable`] over the `_homology` tables of the genome database.
pub struct SqliteOrthologTable {
    config:  Arc<ToolkitConfig>,
    db_path: PathBuf,
}

impl SqliteOrthologTable {
    pub fn new(config: Arc<ToolkitConfig>) -> Self {
        let db_path = config.database_path.clone();
        Self { config, db_path }
    }

    fn connect(&self) -> anyhow::Result<Connection> {
        if !self.db_path.exists() {
            bail!(
                "Genome database {} does not exist",
                self.db_path.display()
            );
        }
        Connection::open_with_flags(
            &self.db_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("Failed to open {}", self.db_path.display()))
    }

    fn open_table(
        &self,
        assembly: &str,
    ) -> anyhow::Result<(Connection, String)> {
        let table = self
            .config
            .genome(assembly)
            .map_err(|e| anyhow!(e))?
            .homology_table();
        let conn = self.connect()?;
        let exists = conn
            .prepare("SELECT 1 FROM sqlite_master WHERE type='table' AND name=?1")?
            .exists([&table])?;
        if !exists {
            bail!("Homology table '{}' not found in the genome database", table);
        }
        Ok((conn, table))
    }
}

impl OrthologTable for SqliteOrthologTable {
    fn relations(
        &self,
        assembly: &str,
        direction: ConversionDirection,
        ids: &[String],
    ) -> anyhow::Result<Vec<OrthologRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let (conn, table) = self.open_table(assembly)?;
        let keys = match direction {
            ConversionDirection::CottonToAth => ids.iter().unique().cloned().collect_vec(),
            ConversionDirection::AthToCotton => {
                ids.iter()
                    .map(|id| to_base_gene(id))
                    .sorted()
                    .dedup()
                    .collect_vec()
            },
        };

        let mut records = Vec::new();
        for batch in keys.chunks(BATCH_SIZE) {
            let (condition, params) = match direction {
                ConversionDirection::CottonToAth => {
                    let placeholders = (1..=batch.len())
                        .map(|i| format!("?{}", i))
                        .join(", ");
                    (format!("\"Query\" IN ({})", placeholders), batch.to_vec())
                },
                ConversionDirection::AthToCotton => {
                    let condition = (1..=batch.len())
                        .map(|i| format!("\"Match\" LIKE ?{}", i))
                        .join(" OR ");
                    let patterns = batch
                        .iter()
                        .map(|base| format!("{}%", base))
                        .collect_vec();
                    (condition, patterns)
                },
            };
            let query = format!(
                "SELECT \"Query\", \"Match\", \"Description\" FROM \"{}\" WHERE {}",
                table, condition
            );
            let mut stmt = conn.prepare(&query)?;
            let rows = stmt.query_map(params_from_iter(params.iter()), |row| {
                Ok(OrthologRecord {
                    query:       row.get(0)?,
                    matched:     row.get(1)?,
                    description: row.get(2)?,
                })
            })?;
            for record in rows {
                records.push(record?);
            }
        }
        debug!("{} relations from {} for {} keys", records.len(), table, keys.len());
        Ok(records)
    }

    fn id_exists(
        &self,
        assembly: &str,
        direction: ConversionDirection,
        id: &str,
    ) -> anyhow::Result<bool> {
        let (conn, table) = self.open_table(assembly)?;
        let column = match direction {
            ConversionDirection::CottonToAth => "Query",
            ConversionDirection::AthToCotton => "Match",
        };
        let query = format!(
            "SELECT 1 FROM \"{}\" WHERE \"{}\" = ?1 LIMIT 1",
            table, column
        );
        let exists = conn.prepare(&query)?.exists([id])?;
        Ok(exists)
    }
}
