//! Duplicate detection over the full collection: size proximity plus a
//! cleaned-filename prefix test, grouped in a single pass and stored as a
//! full link mesh.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::db::models::Sample;
use crate::db::{Database, Result};

/// Two files within this many bytes of each other are size candidates.
const SIZE_TOLERANCE: i64 = 1000;

/// How many cleaned characters the prefix-containment test compares.
const PREFIX_LEN: usize = 10;

static NON_ALNUM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("[^a-z0-9]").expect("static regex"));

#[derive(Debug)]
pub struct DedupeResult {
    pub groups: usize,
    pub samples_linked: usize,
}

/// Recompute all duplicate groups and replace the stored links wholesale.
pub fn recompute_duplicates(db: &Database) -> Result<DedupeResult> {
    let samples = db.get_all_samples()?;
    let groups = duplicate_groups(&samples);
    db.replace_duplicate_links(&groups)?;
    Ok(DedupeResult {
        groups: groups.len(),
        samples_linked: groups.iter().map(Vec::len).sum(),
    })
}

/// Group samples into duplicate clusters. One pass in collection order: each
/// unprocessed sample collects every other unprocessed pairwise match into
/// its group; singleton groups are dropped. Name and size comparisons only,
/// so unclassified samples participate like any other.
pub fn duplicate_groups(samples: &[Sample]) -> Vec<Vec<i64>> {
    let cleaned: Vec<String> = samples.iter().map(|s| clean_name(&s.file_name)).collect();
    let mut processed: HashSet<i64> = HashSet::new();
    let mut groups: Vec<Vec<i64>> = Vec::new();

    for (i, sample) in samples.iter().enumerate() {
        if processed.contains(&sample.id) {
            continue;
        }

        let mut group = vec![sample.id];
        for (j, other) in samples.iter().enumerate() {
            if sample.id == other.id || processed.contains(&other.id) {
                continue;
            }
            if (sample.file_size - other.file_size).abs() < SIZE_TOLERANCE
                && cleaned_similar(&cleaned[i], &cleaned[j])
            {
                group.push(other.id);
                processed.insert(other.id);
            }
        }

        processed.insert(sample.id);
        if group.len() > 1 {
            groups.push(group);
        }
    }

    groups
}

/// Lower-case and strip everything that isn't a-z or 0-9.
pub fn clean_name(name: &str) -> String {
    NON_ALNUM.replace_all(&name.to_lowercase(), "").into_owned()
}

/// Prefix-containment test on cleaned names: does either contain the first
/// PREFIX_LEN characters of the other? Names shorter than PREFIX_LEN compare
/// their whole length, so short names match aggressively.
fn cleaned_similar(a: &str, b: &str) -> bool {
    let prefix_b: String = b.chars().take(PREFIX_LEN).collect();
    let prefix_a: String = a.chars().take(PREFIX_LEN).collect();
    a.contains(&prefix_b) || b.contains(&prefix_a)
}
