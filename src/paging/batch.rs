// SPDX-License-Identifier: GPL-3.0-only

/// Cap applied when partitioning an identifier list for remote calls.
#[derive(Debug, Clone)]
pub enum BatchCap {
    /// At most this many identifiers per batch.
    Count(usize),
    /// The projected serialized length of a templated request containing
    /// the batch must not exceed `budget`. `request_overhead` is the
    /// fixed part of the request, `item_overhead` the per-identifier
    /// framing (e.g. JSON quotes), `separator` the characters between
    /// identifiers (e.g. an url-encoded comma costs 3).
    Chars {
        budget: usize,
        request_overhead: usize,
        item_overhead: usize,
        separator: usize,
    },
}

impl BatchCap {
    fn fits(&self, count: usize, chars: usize, candidate_len: usize) -> bool {
        match self {
            BatchCap::Count(max) => count < *max,
            BatchCap::Chars {
                budget,
                request_overhead,
                item_overhead,
                separator,
            } => {
                let projected = request_overhead
                    + chars
                    + candidate_len
                    + item_overhead
                    + if count > 0 { *separator } else { 0 };
                projected <= *budget
            }
        }
    }
}

/// Remove duplicate identifiers, keeping the first occurrence and the
/// input order of the survivors.
pub fn dedup_preserving_order(ids: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::with_capacity(ids.len());
    ids.iter()
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect()
}

/// Partition `ids` into contiguous batches under `cap`. Every input
/// identifier lands in exactly one batch, in input order. A single
/// identifier that exceeds a character cap on its own is still emitted
/// as a one-element batch rather than dropped.
pub fn split(ids: &[String], cap: &BatchCap) -> Vec<Vec<String>> {
    let mut batches: Vec<Vec<String>> = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut current_chars = 0usize;

    for id in ids {
        if current.is_empty() || cap.fits(current.len(), current_chars, id.len()) {
            if !current.is_empty() {
                if let BatchCap::Chars { separator, .. } = cap {
                    current_chars += separator;
                }
            }
            if let BatchCap::Chars { item_overhead, .. } = cap {
                current_chars += item_overhead;
            }
            current_chars += id.len();
            current.push(id.clone());
        } else {
            batches.push(std::mem::take(&mut current));
            current_chars = id.len();
            if let BatchCap::Chars { item_overhead, .. } = cap {
                current_chars += item_overhead;
            }
            current.push(id.clone());
        }
    }
    if !current.is_empty() {
        batches.push(current);
    }
    batches
}
