//! Outline entries and their de-duplication.
//!
//! A page reports outline *candidates*: the interactive ancestors it found
//! above each label element. The same ancestor can be reached from several
//! labels, and different ancestors can carry the same visible text (a heading
//! repeated in a collapsed and an expanded panel, for instance). Both kinds of
//! duplicates are folded here, keeping discovery order.

use std::collections::HashSet;

/// Identity of an outline element inside the page.
///
/// Backends choose what this means; for the CDP page it is the index of the
/// element in a page-side registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutlineHandle(pub u64);

/// A raw interactive element found above a label, before de-duplication
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineCandidate {
    pub handle: OutlineHandle,
    /// Visible text of the element as reported by the page (untrimmed)
    pub text: String,
}

/// A navigable section of the document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineEntry {
    pub handle: OutlineHandle,
    /// Trimmed display label
    pub label: String,
}

impl OutlineCandidate {
    pub fn new(handle: u64, text: impl Into<String>) -> Self {
        Self {
            handle: OutlineHandle(handle),
            text: text.into(),
        }
    }
}

/// Collapse candidates into the ordered list of entries to visit.
///
/// Candidates are first made unique by handle, then by exact trimmed label;
/// the first occurrence wins in both passes.
pub fn collect_entries<I>(candidates: I) -> Vec<OutlineEntry>
where
    I: IntoIterator<Item = OutlineCandidate>,
{
    let mut seen_handles = HashSet::new();
    let mut seen_labels = HashSet::new();

    candidates
        .into_iter()
        .filter(|c| seen_handles.insert(c.handle))
        .filter_map(|c| {
            let label = c.text.trim().to_string();
            if seen_labels.insert(label.clone()) {
                Some(OutlineEntry {
                    handle: c.handle,
                    label,
                })
            } else {
                None
            }
        })
        .collect()
}
