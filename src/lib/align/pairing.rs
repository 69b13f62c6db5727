//! Pairing modes and smart-pairing classification.

use crate::record::ReadRecord;

/// How reads in a batch relate to each other.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PairingMode {
    /// Every read stands alone.
    #[default]
    SingleEnd,
    /// Reads come in mate pairs at positions `2i` and `2i + 1`.
    Paired,
    /// Mates may or may not be adjacent; pairs are detected by name.
    Smart,
}

/// Splits reads into singletons and adjacent same-name pairs, keeping input order in each.
///
/// ```
/// use seqmap_lib::align::pairing::split_by_pairing;
/// use seqmap_lib::record::ReadRecord;
///
/// let reads = ["a", "a", "b", "c", "c"]
///     .iter()
///     .enumerate()
///     .map(|(i, n)| ReadRecord::new(i as u64, n.as_bytes(), b"ACGT", b"IIII"))
///     .collect();
/// let (singles, pairs) = split_by_pairing(reads);
/// assert_eq!(singles.len(), 1);
/// assert_eq!(pairs.len(), 4);
/// ```
#[must_use]
pub fn split_by_pairing(records: Vec<ReadRecord>) -> (Vec<ReadRecord>, Vec<ReadRecord>) {
    let mut singles = Vec::new();
    let mut pairs = Vec::with_capacity(records.len());
    let mut iter = records.into_iter().peekable();
    while let Some(read) = iter.next() {
        if iter.peek().is_some_and(|next| next.name == read.name) {
            pairs.push(read);
            if let Some(mate) = iter.next() {
                pairs.push(mate);
            }
        } else {
            singles.push(read);
        }
    }
    (singles, pairs)
}

/// Merges two id-ordered read lists back into one id-ordered list.
#[must_use]
pub fn merge_by_id(a: Vec<ReadRecord>, b: Vec<ReadRecord>) -> Vec<ReadRecord> {
    let mut merged = Vec::with_capacity(a.len() + b.len());
    let mut a = a.into_iter().peekable();
    let mut b = b.into_iter().peekable();
    loop {
        let take_a = match (a.peek(), b.peek()) {
            (Some(x), Some(y)) => x.id <= y.id,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => break,
        };
        let next = if take_a { a.next() } else { b.next() };
        merged.extend(next);
    }
    merged
}
