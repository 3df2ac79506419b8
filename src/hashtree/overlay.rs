//! Operations on flattened hash-file lists used by the overlay merge.

use super::node::HashFile;
use rustc_hash::FxHashMap;

/// Union of two flattened lists keyed on filename; entries from `src`
/// win on conflict. The result is sorted ascending by filename.
pub fn put_top(dst: Vec<HashFile>, src: Vec<HashFile>) -> Vec<HashFile> {
    let mut merged: FxHashMap<String, HashFile> = dst
        .into_iter()
        .map(|file| (file.filename.clone(), file))
        .collect();

    for file in src {
        merged.insert(file.filename.clone(), file);
    }

    let mut result: Vec<HashFile> = merged.into_values().collect();
    result.sort_by(|a, b| a.filename.cmp(&b.filename));
    result
}

/// Index of `name` in a list sorted ascending by filename.
pub fn find_file(sorted: &[HashFile], name: &str) -> Option<usize> {
    sorted
        .binary_search_by(|file| file.filename.as_str().cmp(name))
        .ok()
}
