//! Selection thresholds applied to homology searches.

use log::{
    debug,
    warn,
};
use serde::{
    Deserialize,
    Serialize,
};
use serde_json::Value;

/// Caller-supplied overrides keyed by criteria field name. `null` values are
/// ignored.
pub type CriteriaOverrides = serde_json::Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HomologySelectionCriteria {
    /// Passed to the search as the maximum number of target sequences.
    pub top_n:                     usize,
    pub evalue_threshold:          f64,
    /// Minimum percent identity, `None` disables the filter.
    pub pid_threshold:             Option<f64>,
    /// Minimum bit score, `None` disables the filter.
    pub score_threshold:           Option<f64>,
    /// Keep only hits on the same subgenome and chromosome number as their
    /// query.
    pub strict_subgenome_priority: bool,
}

impl Default for HomologySelectionCriteria {
    fn default() -> Self {
        Self {
            top_n:                     1,
            evalue_threshold:          1e-10,
            pid_threshold:             Some(30.0),
            score_threshold:           Some(50.0),
            strict_subgenome_priority: false,
        }
    }
}

impl HomologySelectionCriteria {
    crate::with_field_fn!(top_n, usize);

    crate::with_field_fn!(evalue_threshold, f64);

    crate::with_field_fn!(pid_threshold, Option<f64>);

    crate::with_field_fn!(score_threshold, Option<f64>);

    crate::with_field_fn!(strict_subgenome_priority, bool);

    /// Defaults with `overrides` merged on top.
    pub fn from_overrides(overrides: Option<&CriteriaOverrides>) -> Self {
        let mut criteria = Self::default();
        if let Some(overrides) = overrides {
            criteria.merge(overrides);
        }
        criteria
    }

    /// Applies every non-null override. Unknown keys and values of the wrong
    /// type are logged and skipped.
    pub fn merge(
        &mut self,
        overrides: &CriteriaOverrides,
    ) {
        for (key, value) in overrides {
            if value.is_null() {
                continue;
            }
            let applied = match key.as_str() {
                "top_n" => {
                    value
                        .as_u64()
                        .map(|v| self.top_n = v.max(1) as usize)
                },
                "evalue_threshold" => {
                    value
                        .as_f64()
                        .map(|v| self.evalue_threshold = v)
                },
                "pid_threshold" => {
                    value
                        .as_f64()
                        .map(|v| self.pid_threshold = Some(v))
                },
                "score_threshold" => {
                    value
                        .as_f64()
                        .map(|v| self.score_threshold = Some(v))
                },
                "strict_subgenome_priority" => {
                    value
                        .as_bool()
                        .map(|v| self.strict_subgenome_priority = v)
                },
                _ => {
                    warn!("Ignoring unknown homology criteria key '{}'", key);
                    continue;
                },
            };
            match applied {
                Some(()) => debug!("Criteria override {} = {}", key, value),
                None => {
                    warn!(
                        "Ignoring criteria override {} with unexpected value {}",
                        key, value
                    )
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn overrides(value: Value) -> CriteriaOverrides {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn defaults() {
        let criteria = HomologySelectionCriteria::from_overrides(None);
        assert_eq!(criteria.top_n, 1);
        assert_eq!(criteria.evalue_threshold, 1e-10);
        assert_eq!(criteria.pid_threshold, Some(30.0));
        assert_eq!(criteria.score_threshold, Some(50.0));
        assert!(!criteria.strict_subgenome_priority);
    }

    #[test]
    fn only_non_null_known_keys_apply() {
        let criteria = HomologySelectionCriteria::from_overrides(Some(&overrides(json!({
            "top_n": 5,
            "pid_threshold": null,
            "score_threshold": 80,
            "strict_subgenome_priority": true,
            "coverage": 0.5,
            "evalue_threshold": "tiny"
        }))));
        assert_eq!(criteria.top_n, 5);
        assert_eq!(criteria.pid_threshold, Some(30.0));
        assert_eq!(criteria.score_threshold, Some(80.0));
        assert!(criteria.strict_subgenome_priority);
        assert_eq!(criteria.evalue_threshold, 1e-10);
    }
}
