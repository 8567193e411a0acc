//! Merge progress counters

use std::fmt;

/// What a merge did, accumulated across every folder it visited
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    /// Messages moved from `new/`
    pub moved_new: u64,
    /// Messages moved from `cur/`
    pub moved_cur: u64,
    /// Seen messages moved into the redirect folder
    pub redirected: u64,
    /// Seen messages left in the source
    pub left_behind: u64,
    /// UIDL values handed to destination types
    pub uidls_transferred: u64,
    /// Subfolders moved over as a whole
    pub subfolders_moved: u64,
    /// Subfolders merged into an existing destination subfolder
    pub subfolders_merged: u64,
    /// Subscriptions applied on the destination
    pub subscribed: u64,
    /// Errors reported along the way
    pub errors: u64,
}

impl MergeSummary {
    /// Total number of messages moved out of the source
    pub fn messages_moved(&self) -> u64 {
        self.moved_new + self.moved_cur + self.redirected
    }

    /// Add the counters of another merge
    pub fn absorb(&mut self, other: &MergeSummary) {
        self.moved_new += other.moved_new;
        self.moved_cur += other.moved_cur;
        self.redirected += other.redirected;
        self.left_behind += other.left_behind;
        self.uidls_transferred += other.uidls_transferred;
        self.subfolders_moved += other.subfolders_moved;
        self.subfolders_merged += other.subfolders_merged;
        self.subscribed += other.subscribed;
        self.errors += other.errors;
    }
}

impl fmt::Display for MergeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} new, {} cur, {} redirected, {} left behind, {} subfolders moved, {} merged, {} errors",
            self.moved_new,
            self.moved_cur,
            self.redirected,
            self.left_behind,
            self.subfolders_moved,
            self.subfolders_merged,
            self.errors
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_absorb() {
        let mut total = MergeSummary {
            moved_new: 1,
            errors: 1,
            ..Default::default()
        };
        total.absorb(&MergeSummary {
            moved_new: 2,
            moved_cur: 3,
            redirected: 1,
            ..Default::default()
        });

        assert_eq!(total.messages_moved(), 7);
        assert_eq!(total.errors, 1);
        assert_eq!(
            total.to_string(),
            "3 new, 3 cur, 1 redirected, 0 left behind, 0 subfolders moved, 0 merged, 1 errors"
        );
    }
}
