use super::types::FeedEntry;

/// Outcome of comparing one poll against the previous one.
#[derive(Debug, PartialEq, Eq)]
pub struct Detection {
    /// Entries of the current poll not present in the baseline, in feed order.
    pub new_items: Vec<FeedEntry>,
    /// The baseline for the next comparison: always the full current poll.
    pub next_previous: Vec<FeedEntry>,
}

/// Pure diff between two polls. Suppressing output on the first poll is the
/// caller's job; this always reports what is new.
pub fn detect(previous: &[FeedEntry], current: Vec<FeedEntry>) -> Detection {
    let new_items = current.iter()
        .filter(|entry| !previous.contains(entry))
        .cloned()
        .collect();
    Detection { new_items, next_previous: current }
}
