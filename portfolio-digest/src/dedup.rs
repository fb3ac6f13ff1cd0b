use interfaces::Identified;
use std::collections::HashSet;

/// Keep the first record seen for each identifier, preserving input order.
pub fn dedup_by_id<T, I>(records: I) -> Vec<T>
where
    T: Identified,
    I: IntoIterator<Item = T>,
{
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|record| seen.insert(record.id().to_owned()))
        .collect()
}

/// In-place variant for an owned list; same first-occurrence policy.
pub fn dedup_in_place<T: Identified>(records: &mut Vec<T>) {
    let mut seen = HashSet::new();
    records.retain(|record| seen.insert(record.id().to_owned()));
}
