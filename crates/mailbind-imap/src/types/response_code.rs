//! Bracketed response codes (`[UIDNEXT 42]` and friends).

use super::{Capability, Flags, SeqNum, Uid, UidValidity};

/// Response code carried in status responses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseCode {
    /// `[ALERT]`
    Alert,
    /// `[AUTHENTICATIONFAILED]`
    AuthenticationFailed,
    /// `[CAPABILITY ...]`
    Capability(Vec<Capability>),
    /// `[NONEXISTENT]`
    NonExistent,
    /// `[PERMANENTFLAGS (...)]`
    PermanentFlags(Flags),
    /// `[READ-ONLY]`
    ReadOnly,
    /// `[READ-WRITE]`
    ReadWrite,
    /// `[TRYCREATE]`
    TryCreate,
    /// `[UIDNEXT n]`
    UidNext(Uid),
    /// `[UIDVALIDITY n]`
    UidValidity(UidValidity),
    /// `[UNSEEN n]`
    Unseen(SeqNum),
    /// Any other code, atom only.
    Other(String),
}
