//! Parsed response data.

use crate::types::{
    Capability, Flags, ListResponse, ResponseCode, SeqNum, Status, Uid,
};

/// One data item from a FETCH response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchItem {
    /// `UID n`
    Uid(Uid),
    /// `FLAGS (...)`
    Flags(Flags),
    /// `INTERNALDATE "..."`
    InternalDate(String),
    /// `RFC822.SIZE n`
    Rfc822Size(u32),
    /// `BODY[section]<origin> nstring`, also `RFC822`, `RFC822.HEADER`
    /// and `RFC822.TEXT`.
    Body {
        /// Section specifier as sent by the server; empty for the whole
        /// message.
        section: String,
        /// Partial fetch origin.
        origin: Option<u32>,
        /// Payload; `None` when the server answered `NIL`.
        data: Option<Vec<u8>>,
    },
}

/// Untagged server data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UntaggedResponse {
    /// `* OK|NO|BAD|PREAUTH|BYE [code] text`
    Status {
        /// Status keyword.
        status: Status,
        /// Optional bracketed code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// `* CAPABILITY ...`
    Capability(Vec<Capability>),
    /// `* FLAGS (...)`
    Flags(Flags),
    /// `* LIST (...) "/" name`
    List(ListResponse),
    /// `* SEARCH n...`; numbers are UIDs after UID SEARCH.
    Search(Vec<u32>),
    /// `* n EXISTS`
    Exists(u32),
    /// `* n RECENT`
    Recent(u32),
    /// `* n EXPUNGE`
    Expunge(SeqNum),
    /// `* n FETCH (...)`
    Fetch {
        /// Message sequence number.
        seq: SeqNum,
        /// Data items.
        items: Vec<FetchItem>,
    },
    /// Untagged data this client does not interpret, by keyword.
    Other(String),
}
