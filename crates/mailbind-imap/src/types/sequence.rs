//! UID sets for `UID SEARCH` / `UID FETCH`.

use std::fmt;

use super::Uid;

/// A set of UIDs in wire form (`7`, `3:9`, `12:*`, `1,4:6`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UidSet {
    /// One UID.
    Single(Uid),
    /// Inclusive range.
    Range(Uid, Uid),
    /// From a UID to the highest UID in the mailbox.
    From(Uid),
    /// Union of several sets.
    Union(Vec<Self>),
}

impl UidSet {
    /// Set containing one UID.
    #[must_use]
    pub const fn single(uid: Uid) -> Self {
        Self::Single(uid)
    }

    /// Builds the shortest set covering `uids`, collapsing consecutive runs
    /// into ranges. Returns `None` for an empty input.
    #[must_use]
    pub fn from_uids(uids: impl IntoIterator<Item = Uid>) -> Option<Self> {
        let mut sorted: Vec<Uid> = uids.into_iter().collect();
        sorted.sort_unstable();
        sorted.dedup();

        let mut parts = Vec::new();
        let mut iter = sorted.into_iter();
        let mut start = iter.next()?;
        let mut end = start;

        for uid in iter {
            if uid.get() == end.get() + 1 {
                end = uid;
                continue;
            }
            parts.push(Self::run(start, end));
            start = uid;
            end = uid;
        }
        parts.push(Self::run(start, end));

        if parts.len() == 1 {
            parts.pop()
        } else {
            Some(Self::Union(parts))
        }
    }

    fn run(start: Uid, end: Uid) -> Self {
        if start == end {
            Self::Single(start)
        } else {
            Self::Range(start, end)
        }
    }
}

impl fmt::Display for UidSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(uid) => write!(f, "{uid}"),
            Self::Range(start, end) => write!(f, "{start}:{end}"),
            Self::From(start) => write!(f, "{start}:*"),
            Self::Union(parts) => {
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{part}")?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn uids(values: &[u32]) -> Vec<Uid> {
        values.iter().map(|&v| Uid::new(v).unwrap()).collect()
    }

    #[test]
    fn test_single_and_from() {
        let uid = Uid::new(42).unwrap();
        assert_eq!(UidSet::single(uid).to_string(), "42");
        assert_eq!(UidSet::From(uid).to_string(), "42:*");
    }

    #[test]
    fn test_from_uids_collapses_runs() {
        let set = UidSet::from_uids(uids(&[9, 1, 2, 3, 7, 8, 12])).unwrap();
        assert_eq!(set.to_string(), "1:3,7:9,12");
    }

    #[test]
    fn test_from_uids_single_run() {
        let set = UidSet::from_uids(uids(&[5, 6, 6, 7])).unwrap();
        assert_eq!(set, UidSet::Range(Uid::new(5).unwrap(), Uid::new(7).unwrap()));
    }

    #[test]
    fn test_from_uids_empty() {
        assert!(UidSet::from_uids(Vec::new()).is_none());
    }
}
