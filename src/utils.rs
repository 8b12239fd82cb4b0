//! Small helpers shared across the crate: builder/getter macros, order
//! preserving deduplication and worker-count discovery.

use hashbrown::HashSet;
use itertools::Itertools;

/// Environment variable overriding the configured number of search workers.
pub const MAX_WORKERS_ENV: &str = "COTTONKIT_MAX_WORKERS";

/// Number of search workers requested through [`MAX_WORKERS_ENV`], if any.
pub fn env_max_workers() -> Option<usize> {
    std::env::var(MAX_WORKERS_ENV)
        .ok()
        .and_then(|str| str.parse::<usize>().ok())
        .filter(|n| *n > 0)
}

/// Removes duplicates while keeping the first occurrence of every value.
pub fn dedup_preserving_order<I, S>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>, {
    let mut seen = HashSet::new();
    values
        .into_iter()
        .map(Into::into)
        .filter(|value: &String| seen.insert(value.clone()))
        .collect_vec()
}

/// Formats at most `limit` ids for log messages, marking truncation.
pub fn preview_ids(
    ids: &[String],
    limit: usize,
) -> String {
    let mut preview = ids.iter().take(limit).join(", ");
    if ids.len() > limit {
        preview.push_str("...");
    }
    preview
}

#[macro_export]
macro_rules! getter_fn {
    ($field_name: ident, $field_type: ty) => {
        pub fn $field_name(&self) -> &$field_type {
            &self.$field_name
        }
    };
}
pub use getter_fn;

#[macro_export]
macro_rules! with_field_fn {
    ($field_name: ident, $field_type: ty) => {
        paste::paste! {
            pub fn [<with_$field_name>](mut self, value: $field_type) -> Self {
            self.$field_name = value;
            self
            }
        }
    };
}
pub use with_field_fn;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_keeps_first_seen_order() {
        let values = dedup_preserving_order(["b", "a", "b", "c", "a"]);
        assert_eq!(values, vec!["b", "a", "c"]);
    }

    #[test]
    fn preview_marks_truncation() {
        let ids = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        assert_eq!(preview_ids(&ids, 2), "a, b...");
        assert_eq!(preview_ids(&ids, 5), "a, b, c");
    }
}
