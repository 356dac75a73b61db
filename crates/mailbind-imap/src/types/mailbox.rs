//! Mailbox names, LIST data and SELECT status.

use std::fmt;

use super::{Flags, SeqNum, Uid, UidValidity};

/// A mailbox name.
///
/// `INBOX` is case-insensitive on the wire, so any spelling of it is
/// normalized on construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Mailbox(String);

impl Mailbox {
    /// Creates a mailbox name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        if name.eq_ignore_ascii_case("INBOX") {
            Self::inbox()
        } else {
            Self(name)
        }
    }

    /// The `INBOX` mailbox.
    #[must_use]
    pub fn inbox() -> Self {
        Self("INBOX".to_string())
    }

    /// Returns the name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Snapshot of the data a server reports while selecting a mailbox.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MailboxStatus {
    /// `* n EXISTS`
    pub exists: u32,
    /// `* n RECENT`
    pub recent: u32,
    /// `[UNSEEN n]`
    pub unseen: Option<SeqNum>,
    /// `[UIDNEXT n]`
    pub uid_next: Option<Uid>,
    /// `[UIDVALIDITY n]`
    pub uid_validity: Option<UidValidity>,
    /// `* FLAGS (...)`
    pub flags: Flags,
    /// `[PERMANENTFLAGS (...)]`
    pub permanent_flags: Flags,
    /// `[READ-ONLY]` on the completion.
    pub read_only: bool,
}

/// One `* LIST` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListResponse {
    /// Name attributes.
    pub attributes: Vec<MailboxAttribute>,
    /// Hierarchy delimiter, `None` for a flat namespace.
    pub delimiter: Option<char>,
    /// Mailbox name.
    pub mailbox: Mailbox,
}

impl ListResponse {
    /// Returns false for `\NoSelect` / `\NonExistent` entries.
    #[must_use]
    pub fn is_selectable(&self) -> bool {
        !self
            .attributes
            .iter()
            .any(|a| matches!(a, MailboxAttribute::NoSelect | MailboxAttribute::NonExistent))
    }
}

/// Mailbox name attribute from LIST.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MailboxAttribute {
    /// `\NoSelect`
    NoSelect,
    /// `\NonExistent`
    NonExistent,
    /// `\NoInferiors`
    NoInferiors,
    /// `\HasChildren`
    HasChildren,
    /// `\HasNoChildren`
    HasNoChildren,
    /// `\Marked`
    Marked,
    /// `\Unmarked`
    Unmarked,
    /// `\Sent` (special-use)
    Sent,
    /// `\Drafts` (special-use)
    Drafts,
    /// `\Trash` (special-use)
    Trash,
    /// `\Junk` (special-use)
    Junk,
    /// `\Archive` (special-use)
    Archive,
    /// Anything else.
    Other(String),
}

impl MailboxAttribute {
    /// Parses an attribute atom.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "\\noselect" => Self::NoSelect,
            "\\nonexistent" => Self::NonExistent,
            "\\noinferiors" => Self::NoInferiors,
            "\\haschildren" => Self::HasChildren,
            "\\hasnochildren" => Self::HasNoChildren,
            "\\marked" => Self::Marked,
            "\\unmarked" => Self::Unmarked,
            "\\sent" => Self::Sent,
            "\\drafts" => Self::Drafts,
            "\\trash" => Self::Trash,
            "\\junk" => Self::Junk,
            "\\archive" => Self::Archive,
            _ => Self::Other(s.to_string()),
        }
    }
}
