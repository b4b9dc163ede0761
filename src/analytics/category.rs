//! Categorical breakdown over a closed set of known categories

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::analytics::models::{CategoryCount, MetricRecord};

/// A closed, enumerated set of category values
pub trait Category: Copy + Eq + 'static {
    /// Every member, in display order
    fn all() -> &'static [Self];

    /// Stored / wire representation
    fn as_str(&self) -> &'static str;

    /// Exact, case-sensitive lookup of a stored value
    fn parse(raw: &str) -> Option<Self> {
        Self::all().iter().copied().find(|c| c.as_str() == raw)
    }
}

/// Processing status of a lead
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeadStatus {
    Pending,
    Contacted,
    Closed,
}

impl Category for LeadStatus {
    fn all() -> &'static [Self] {
        &[LeadStatus::Pending, LeadStatus::Contacted, LeadStatus::Closed]
    }

    fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::Pending => "PENDING",
            LeadStatus::Contacted => "CONTACTED",
            LeadStatus::Closed => "CLOSED",
        }
    }
}

/// Count records per known category.
///
/// The output has one entry per element of `known`, in that order, zero
/// when nothing matched. Records without a category, or with a value
/// outside `known`, are not counted.
pub fn breakdown<C: Category>(records: &[MetricRecord], known: &[C]) -> Vec<CategoryCount> {
    let mut counts = known
        .iter()
        .map(|c| CategoryCount {
            category: c.as_str().to_string(),
            count: 0,
        })
        .collect::<Vec<_>>();

    let mut unrecognized = 0usize;
    for raw in records.iter().filter_map(|r| r.category.as_deref()) {
        match known.iter().position(|c| c.as_str() == raw) {
            Some(idx) => counts[idx].count += 1,
            None => unrecognized += 1,
        }
    }

    if unrecognized > 0 {
        trace!(unrecognized, "records with unknown categories left out of breakdown");
    }

    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn lead(status: Option<&str>) -> MetricRecord {
        MetricRecord {
            entity_id: "listing-1".to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap(),
            category: status.map(str::to_string),
            value: None,
        }
    }

    #[test]
    fn test_breakdown_drops_unknown_categories() {
        let records = vec![
            lead(Some("PENDING")),
            lead(Some("PENDING")),
            lead(Some("CLOSED")),
            lead(Some("ARCHIVED")),
        ];

        let result = breakdown(&records, LeadStatus::all());

        assert_eq!(
            result,
            vec![
                CategoryCount { category: "PENDING".to_string(), count: 2 },
                CategoryCount { category: "CONTACTED".to_string(), count: 0 },
                CategoryCount { category: "CLOSED".to_string(), count: 1 },
            ]
        );
        assert_eq!(result.iter().map(|c| c.count).sum::<u64>(), 3);
    }

    #[test]
    fn test_breakdown_is_case_sensitive() {
        let records = vec![lead(Some("pending")), lead(None)];
        let result = breakdown(&records, LeadStatus::all());
        assert!(result.iter().all(|c| c.count == 0));
    }

    #[test]
    fn test_breakdown_follows_caller_order() {
        let known = [LeadStatus::Closed, LeadStatus::Pending];
        let records = vec![lead(Some("PENDING")), lead(Some("CONTACTED"))];

        let result = breakdown(&records, &known);

        assert_eq!(result.len(), 2);
        assert_eq!(result[0].category, "CLOSED");
        assert_eq!(result[0].count, 0);
        assert_eq!(result[1].category, "PENDING");
        assert_eq!(result[1].count, 1);
    }

    #[test]
    fn test_empty_input_is_zero_filled() {
        let result = breakdown(&[], LeadStatus::all());
        assert_eq!(result.len(), 3);
        assert!(result.iter().all(|c| c.count == 0));
    }

    #[test]
    fn test_lead_status_parse() {
        assert_eq!(LeadStatus::parse("CONTACTED"), Some(LeadStatus::Contacted));
        assert_eq!(LeadStatus::parse("Contacted"), None);
        assert_eq!(LeadStatus::parse("ARCHIVED"), None);
    }
}
