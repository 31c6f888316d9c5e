use std::sync::Arc;

use log::debug;

use super::model::Column;

/// Point indices ordered so that `values[rank[i]]` is non-decreasing.
///
/// The sort is stable, so equal values keep their row order. NaNs sort last.
pub fn stable_rank(values: &[f64]) -> Vec<usize> {
    let mut rank: Vec<usize> = (0..values.len()).collect();
    rank.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
    rank
}

/// Rank of a column, computed once and cached on the column until its values
/// change. A cache hit hands back the very same allocation.
pub fn compute_rank(column: &mut Column) -> Arc<[usize]> {
    if let Some(rank) = column.cached_rank() {
        debug!("rank cache HIT for '{}'", column.label);
        return rank;
    }
    let rank: Arc<[usize]> = stable_rank(column.values()).into();
    column.store_rank(Arc::clone(&rank));
    debug!("rank cache STORE for '{}'", column.label);
    rank
}
