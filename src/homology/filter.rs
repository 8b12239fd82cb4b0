//! Post-filters applied to the aggregated hit table, in this order:
//! identity, bit score, strict subgenome match.

use log::debug;
use polars::prelude::*;

use crate::criteria::HomologySelectionCriteria;
use crate::hits::{
    BIT_SCORE,
    HIT_ID,
    IDENTITY,
    QUERY_ID,
};
use crate::ids::SubgenomeTag;

/// Applies every filter enabled in `criteria`. The subgenome filter only
/// runs when `same_family` is set, i.e. both assemblies are cotton.
pub fn apply_filters(
    df: DataFrame,
    criteria: &HomologySelectionCriteria,
    same_family: bool,
) -> PolarsResult<DataFrame> {
    let before = df.height();
    let df = keep_at_least(df, IDENTITY, criteria.pid_threshold)?;
    let df = keep_at_least(df, BIT_SCORE, criteria.score_threshold)?;
    let df = if criteria.strict_subgenome_priority && same_family {
        keep_same_subgenome(df)?
    }
    else {
        df
    };
    debug!("Post-filters kept {} of {} hits", df.height(), before);
    Ok(df)
}

/// Rows whose `column` value is numeric and `>= threshold`. Values that do
/// not parse as numbers are dropped. A missing column or threshold keeps
/// the table as is.
pub fn keep_at_least(
    df: DataFrame,
    column: &str,
    threshold: Option<f64>,
) -> PolarsResult<DataFrame> {
    let Some(threshold) = threshold
    else {
        return Ok(df);
    };
    if df.get_column_index(column).is_none() {
        return Ok(df);
    }
    let values = df
        .column(column)?
        .cast(&DataType::Float64)?;
    let mask: BooleanChunked = values
        .as_materialized_series()
        .f64()?
        .into_iter()
        .map(|value| value.is_some_and(|v| v >= threshold))
        .collect();
    df.filter(&mask)
}

/// Rows whose query and hit ids carry the same subgenome letter and
/// chromosome number. Rows where either id has no tag are dropped.
pub fn keep_same_subgenome(df: DataFrame) -> PolarsResult<DataFrame> {
    let queries = df.column(QUERY_ID)?.as_materialized_series();
    let hits = df.column(HIT_ID)?.as_materialized_series();
    let mask: BooleanChunked = queries
        .str()?
        .into_iter()
        .zip(hits.str()?.into_iter())
        .map(|(query, hit)| {
            match (
                query.and_then(SubgenomeTag::parse),
                hit.and_then(SubgenomeTag::parse),
            ) {
                (Some(query), Some(hit)) => query == hit,
                _ => false,
            }
        })
        .collect();
    df.filter(&mask)
}

#[cfg(test)]
mod tests {
    use itertools::Itertools;
    use rstest::rstest;

    use super::*;
    use crate::hits::{
        hits_to_frame,
        HomologyHit,
    };

    fn hit_ids(df: &DataFrame) -> Vec<String> {
        df.column(HIT_ID)
            .unwrap()
            .as_materialized_series()
            .str()
            .unwrap()
            .into_iter()
            .map(|v| v.unwrap_or_default().to_string())
            .collect_vec()
    }

    #[rstest]
    #[case("Gh_A05G005678", true)]
    #[case("Gh_D05G005678", false)]
    #[case("Gh_A07G005678", false)]
    #[case("Gh_Scaffold1G01", false)]
    fn strict_subgenome_pairs(
        #[case] hit: &str,
        #[case] kept: bool,
    ) {
        let df = hits_to_frame(vec![HomologyHit::new("Gh_A05G001234", hit)]).unwrap();
        let filtered = keep_same_subgenome(df).unwrap();
        assert_eq!(filtered.height() == 1, kept);
    }

    #[test]
    fn thresholds_and_order() {
        let df = hits_to_frame(vec![
            HomologyHit::new("Gh_A05G1", "Gh_A05G2")
                .with_identity(95.0)
                .with_bit_score(200.0),
            HomologyHit::new("Gh_A05G1", "Gh_D05G2")
                .with_identity(95.0)
                .with_bit_score(200.0),
            HomologyHit::new("Gh_A05G1", "Gh_A05G3")
                .with_identity(20.0)
                .with_bit_score(200.0),
            HomologyHit::new("Gh_A05G1", "Gh_A05G4")
                .with_identity(95.0)
                .with_bit_score(10.0),
        ])
        .unwrap();

        let criteria = HomologySelectionCriteria::default().with_strict_subgenome_priority(true);
        let strict = apply_filters(df.clone(), &criteria, true).unwrap();
        assert_eq!(hit_ids(&strict), vec!["Gh_A05G2"]);

        let other_family = apply_filters(df.clone(), &criteria, false).unwrap();
        assert_eq!(hit_ids(&other_family), vec!["Gh_A05G2", "Gh_D05G2"]);

        let open = HomologySelectionCriteria::default()
            .with_pid_threshold(None)
            .with_score_threshold(None);
        assert_eq!(apply_filters(df, &open, true).unwrap().height(), 4);
    }

    #[test]
    fn non_numeric_identity_is_dropped() {
        let df = df!(
            IDENTITY => ["99.1", "n/a", "31"],
            HIT_ID => ["a", "b", "c"]
        )
        .unwrap();
        let filtered = keep_at_least(df, IDENTITY, Some(30.0)).unwrap();
        assert_eq!(hit_ids(&filtered), vec!["a", "c"]);
    }

    #[test]
    fn missing_column_is_ignored() {
        let df = df!(HIT_ID => ["a"]).unwrap();
        assert_eq!(keep_at_least(df, BIT_SCORE, Some(50.0)).unwrap().height(), 1);
    }
}
