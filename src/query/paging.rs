//! Skip/limit windows over an ordered result set.

use serde::{Deserialize, Serialize};

/// An optional `(skip, limit)` pair.
///
/// A paging spec with both fields absent is *empty* and is distinct from one
/// carrying explicit zeroes. Negative values cannot be expressed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Paging {
    pub skip: Option<u64>,
    pub limit: Option<u64>,
}

impl Paging {
    pub fn new(skip: Option<u64>, limit: Option<u64>) -> Self {
        Self { skip, limit }
    }

    /// Paging that only skips; the tail is unbounded.
    pub fn skip(skip: u64) -> Self {
        Self::new(Some(skip), None)
    }

    /// Paging that returns the first `limit` matches.
    pub fn limit(limit: u64) -> Self {
        Self::new(None, Some(limit))
    }

    /// Returns true if neither skip nor limit is set.
    pub fn is_empty(&self) -> bool {
        self.skip.is_none() && self.limit.is_none()
    }

    /// Applies skip, then limit, to an already ordered iterator.
    pub fn apply<I: Iterator>(&self, iter: I) -> std::iter::Take<std::iter::Skip<I>> {
        let skip = self.skip.map_or(0, saturating_usize);
        let take = self.limit.map_or(usize::MAX, saturating_usize);
        iter.skip(skip).take(take)
    }
}

fn saturating_usize(n: u64) -> usize {
    usize::try_from(n).unwrap_or(usize::MAX)
}
