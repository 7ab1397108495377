//! Blending per-subsystem candidate lists into the final ranked list
//!
//! The blender guarantees origin diversity: every group gets its minimum
//! quota filled round-robin before the remaining slots go to the highest
//! scores overall. Event ids are globally distinct in the output, and the
//! output is not re-sorted afterwards.

use std::collections::HashSet;

use citypulse_core::models::recommendation::RecItem;
use uuid::Uuid;

/// Merge candidate groups, given in their fixed subsystem order, into one
/// list of at most `limit` items with at least `min_by_group` items from
/// every group that can supply them.
pub fn blend_groups(
    groups: Vec<Vec<RecItem>>,
    min_by_group: usize,
    limit: usize,
) -> Vec<RecItem> {
    // Inside each group: best first, at most `limit`, one entry per event.
    let mut groups: Vec<Vec<RecItem>> = groups
        .into_iter()
        .map(|group| top_k_distinct(group, limit))
        .collect();

    let mut selected: Vec<RecItem> = Vec::new();
    let mut seen: HashSet<Uuid> = HashSet::new();

    // Fairness rounds: one pick per group per round, skipping event ids
    // already taken by an earlier group.
    for _ in 0..min_by_group {
        for group in groups.iter_mut() {
            if let Some(pos) = group.iter().position(|item| !seen.contains(&item.event.id)) {
                let item = group.remove(pos);
                seen.insert(item.event.id);
                selected.push(item);
            }
        }
    }

    // Fill with the best of whatever is left, regardless of origin.
    let mut remaining: Vec<RecItem> = groups.into_iter().flatten().collect();
    remaining.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    for item in remaining {
        if selected.len() >= limit {
            break;
        }
        if seen.insert(item.event.id) {
            selected.push(item);
        }
    }

    // The fairness rounds alone can overshoot when
    // min_by_group * groups > limit.
    selected.truncate(limit);
    selected
}

/// Sort by score descending, truncate to `k`, drop duplicate event ids
/// keeping the best-scored occurrence.
fn top_k_distinct(mut group: Vec<RecItem>, k: usize) -> Vec<RecItem> {
    group.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    let mut seen: HashSet<Uuid> = HashSet::new();
    group.retain(|item| seen.insert(item.event.id));
    group.truncate(k);
    group
}
