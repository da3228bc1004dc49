//! Selection of listed objects by name and embedded date.

use chrono::NaiveDate;
use geo_common::extract_date;
use serde::{Deserialize, Serialize};

/// Which listed objects a run should consider.
///
/// Date bounds are inclusive and compare against the first `YYYY-MM-DD` in
/// the object name; objects without a date never pass a date bound.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectFilter {
    /// Required name suffix, e.g. `.nc`.
    pub suffix: Option<String>,
    /// Required substring anywhere in the name.
    pub contains: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    /// Keep at most this many objects, in name order.
    pub limit: Option<usize>,
}

impl ObjectFilter {
    pub fn with_suffix(suffix: impl Into<String>) -> Self {
        Self {
            suffix: Some(suffix.into()),
            ..Default::default()
        }
    }

    /// Name-level test; `limit` is applied by [`ObjectFilter::apply`].
    pub fn matches(&self, name: &str) -> bool {
        if let Some(suffix) = &self.suffix {
            if !name.ends_with(suffix.as_str()) {
                return false;
            }
        }
        if let Some(needle) = &self.contains {
            if !name.contains(needle.as_str()) {
                return false;
            }
        }
        if self.from.is_none() && self.to.is_none() {
            return true;
        }
        match extract_date(name) {
            Some(date) => {
                self.from.map_or(true, |from| date >= from) && self.to.map_or(true, |to| date <= to)
            }
            None => false,
        }
    }

    /// Sort by name, keep matches, then cut to `limit`.
    pub fn apply<T, F>(&self, mut items: Vec<T>, name: F) -> Vec<T>
    where
        F: Fn(&T) -> &str,
    {
        items.retain(|item| self.matches(name(item)));
        items.sort_by(|a, b| name(a).cmp(name(b)));
        if let Some(limit) = self.limit {
            items.truncate(limit);
        }
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: &str) -> NaiveDate {
        NaiveDate::parse_from_str(d, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_suffix_and_substring() {
        let filter = ObjectFilter {
            contains: Some("tempo_".to_string()),
            ..ObjectFilter::with_suffix(".nc")
        };
        assert!(filter.matches("raw/tempo_2024-01-15.nc"));
        assert!(!filter.matches("raw/tempo_2024-01-15.nc.aux"));
        assert!(!filter.matches("raw/other_2024-01-15.nc"));
    }

    #[test]
    fn test_date_range_is_inclusive() {
        let filter = ObjectFilter {
            from: Some(date("2024-01-10")),
            to: Some(date("2024-01-20")),
            ..Default::default()
        };
        assert!(filter.matches("2024-01-10_NO2.tif"));
        assert!(filter.matches("2024-01-20_NO2.tif"));
        assert!(!filter.matches("2024-01-21_NO2.tif"));
        assert!(!filter.matches("undated.tif"));
    }

    #[test]
    fn test_apply_sorts_and_limits() {
        let filter = ObjectFilter {
            limit: Some(2),
            ..ObjectFilter::with_suffix(".tif")
        };
        let names = vec!["c_2024-01-03.tif", "a_2024-01-01.tif", "notes.txt", "b_2024-01-02.tif"];
        let kept = filter.apply(names, |n| *n);
        assert_eq!(kept, vec!["a_2024-01-01.tif", "b_2024-01-02.tif"]);
    }
}
