use crate::analytics::models::Summary;

/// Combine the scalar totals of a report.
///
/// Missing values count as zero instead of poisoning the total.
pub fn summarize<I>(entity_count: i64, record_count: i64, values: I) -> Summary
where
    I: IntoIterator<Item = Option<f64>>,
{
    let total_value: f64 = values.into_iter().map(|v| v.unwrap_or(0.0)).sum();

    Summary {
        entity_count,
        record_count,
        total_value,
    }
}
