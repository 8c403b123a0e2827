use super::record::Record;

/// Records whose searchable fields contain `query`, ignoring case.
///
/// An empty query matches everything. Order is preserved.
pub fn filter_records<'a>(records: &'a [Record], query: &str, fields: &[&str]) -> Vec<&'a Record> {
  if query.is_empty() {
    return records.iter().collect();
  }

  let needle = query.to_lowercase();
  records
    .iter()
    .filter(|record| {
      fields.iter().any(|field| {
        record
          .text(field)
          .map(|value| value.to_lowercase().contains(&needle))
          .unwrap_or(false)
      })
    })
    .collect()
}
