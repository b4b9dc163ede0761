//! Top-N ranking of entities by metric

use std::collections::HashMap;

use crate::analytics::models::{MetricRecord, RankedEntity};

/// Keep the `n` entities with the highest metric, highest first.
///
/// The sort is stable: entities with equal metrics stay in the order they
/// were supplied, so identical inputs always rank identically.
pub fn top_n(mut candidates: Vec<RankedEntity>, n: usize) -> Vec<RankedEntity> {
    if n == 0 {
        return Vec::new();
    }

    candidates.sort_by(|a, b| b.metric_value.total_cmp(&a.metric_value));
    candidates.truncate(n);
    candidates
}

/// Collapse raw records into one candidate per entity, summing `value`.
///
/// Entities appear in the order they are first seen. Labels fall back to
/// the entity id when `labels` has no entry.
pub fn totals_from_records(
    records: &[MetricRecord],
    labels: &HashMap<String, String>,
) -> Vec<RankedEntity> {
    let mut positions: HashMap<&str, usize> = HashMap::new();
    let mut totals: Vec<RankedEntity> = Vec::new();

    for record in records {
        let idx = *positions
            .entry(record.entity_id.as_str())
            .or_insert_with(|| {
                totals.push(RankedEntity {
                    id: record.entity_id.clone(),
                    label: labels
                        .get(&record.entity_id)
                        .cloned()
                        .unwrap_or_else(|| record.entity_id.clone()),
                    metric_value: 0.0,
                });
                totals.len() - 1
            });
        totals[idx].metric_value += record.value.unwrap_or(0.0);
    }

    totals
}
