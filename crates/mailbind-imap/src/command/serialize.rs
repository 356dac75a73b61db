//! Wire encoding of command arguments.

use super::types::{FetchAttribute, SearchCriteria};

/// Command bytes split at synchronizing literals.
///
/// Every chunk except the last ends with a `{n}\r\n` literal header; the
/// client must wait for a `+` continuation before sending the next chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoded {
    chunks: Vec<Vec<u8>>,
}

impl Encoded {
    /// The chunks in send order.
    #[must_use]
    pub fn chunks(&self) -> &[Vec<u8>] {
        &self.chunks
    }

    /// Concatenation of all chunks, as it appears on the wire.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        self.chunks.concat()
    }

    /// True if the command carries at least one synchronizing literal.
    #[must_use]
    pub fn has_literals(&self) -> bool {
        self.chunks.len() > 1
    }
}

/// Incremental command writer.
#[derive(Debug, Default)]
pub(crate) struct Encoder {
    done: Vec<Vec<u8>>,
    current: Vec<u8>,
}

impl Encoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.current.extend_from_slice(bytes);
        self
    }

    pub fn sp(&mut self) -> &mut Self {
        self.raw(b" ")
    }

    /// Writes an astring: atom when possible, quoted string when the value
    /// only needs escaping, literal when it contains bytes a quoted string
    /// cannot carry.
    pub fn astring(&mut self, s: &str) -> &mut Self {
        if needs_literal(s) {
            return self.literal(s.as_bytes());
        }
        if !s.is_empty() && s.bytes().all(is_astring_char) {
            return self.raw(s.as_bytes());
        }
        self.quoted(s)
    }

    /// Writes a quoted string, falling back to a literal when needed.
    pub fn string(&mut self, s: &str) -> &mut Self {
        if needs_literal(s) {
            self.literal(s.as_bytes())
        } else {
            self.quoted(s)
        }
    }

    /// Writes a LIST pattern; `%` and `*` stay unquoted.
    pub fn list_mailbox(&mut self, s: &str) -> &mut Self {
        if !s.is_empty()
            && s
                .bytes()
                .all(|b| is_astring_char(b) || b == b'%' || b == b'*')
        {
            return self.raw(s.as_bytes());
        }
        self.string(s)
    }

    fn quoted(&mut self, s: &str) -> &mut Self {
        self.current.push(b'"');
        for b in s.bytes() {
            if b == b'"' || b == b'\\' {
                self.current.push(b'\\');
            }
            self.current.push(b);
        }
        self.current.push(b'"');
        self
    }

    fn literal(&mut self, data: &[u8]) -> &mut Self {
        self.current
            .extend_from_slice(format!("{{{}}}\r\n", data.len()).as_bytes());
        self.done.push(std::mem::take(&mut self.current));
        self.current.extend_from_slice(data);
        self
    }

    pub fn fetch_attributes(&mut self, items: &[FetchAttribute]) -> &mut Self {
        self.raw(b"(");
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                self.sp();
            }
            match item {
                FetchAttribute::Uid => self.raw(b"UID"),
                FetchAttribute::Flags => self.raw(b"FLAGS"),
                FetchAttribute::InternalDate => self.raw(b"INTERNALDATE"),
                FetchAttribute::Rfc822Size => self.raw(b"RFC822.SIZE"),
                FetchAttribute::Body { section, peek } => {
                    if *peek {
                        self.raw(b"BODY.PEEK[");
                    } else {
                        self.raw(b"BODY[");
                    }
                    self.raw(section.as_bytes());
                    self.raw(b"]")
                }
            };
        }
        self.raw(b")")
    }

    pub fn search(&mut self, criteria: &SearchCriteria) -> &mut Self {
        match criteria {
            SearchCriteria::All => self.raw(b"ALL"),
            SearchCriteria::Answered => self.raw(b"ANSWERED"),
            SearchCriteria::Deleted => self.raw(b"DELETED"),
            SearchCriteria::Flagged => self.raw(b"FLAGGED"),
            SearchCriteria::New => self.raw(b"NEW"),
            SearchCriteria::Seen => self.raw(b"SEEN"),
            SearchCriteria::Unseen => self.raw(b"UNSEEN"),
            SearchCriteria::Undeleted => self.raw(b"UNDELETED"),
            SearchCriteria::Unflagged => self.raw(b"UNFLAGGED"),
            SearchCriteria::From(s) => self.raw(b"FROM ").string(s),
            SearchCriteria::To(s) => self.raw(b"TO ").string(s),
            SearchCriteria::Cc(s) => self.raw(b"CC ").string(s),
            SearchCriteria::Subject(s) => self.raw(b"SUBJECT ").string(s),
            SearchCriteria::Body(s) => self.raw(b"BODY ").string(s),
            SearchCriteria::Text(s) => self.raw(b"TEXT ").string(s),
            SearchCriteria::Header(field, value) => {
                self.raw(b"HEADER ").astring(field).sp().string(value)
            }
            SearchCriteria::Keyword(flag) => self.raw(b"KEYWORD ").raw(flag.as_bytes()),
            SearchCriteria::Since(date) => self.raw(b"SINCE ").raw(date.as_bytes()),
            SearchCriteria::Before(date) => self.raw(b"BEFORE ").raw(date.as_bytes()),
            SearchCriteria::On(date) => self.raw(b"ON ").raw(date.as_bytes()),
            SearchCriteria::Larger(n) => self.raw(format!("LARGER {n}").as_bytes()),
            SearchCriteria::Smaller(n) => self.raw(format!("SMALLER {n}").as_bytes()),
            SearchCriteria::Uid(set) => self.raw(format!("UID {set}").as_bytes()),
            SearchCriteria::And(keys) if keys.is_empty() => self.raw(b"ALL"),
            SearchCriteria::And(keys) => {
                self.raw(b"(");
                for (i, key) in keys.iter().enumerate() {
                    if i > 0 {
                        self.sp();
                    }
                    self.search(key);
                }
                self.raw(b")")
            }
            SearchCriteria::Or(a, b) => self.raw(b"OR ").search(a).sp().search(b),
            SearchCriteria::Not(key) => self.raw(b"NOT ").search(key),
        }
    }

    pub fn crlf(&mut self) -> &mut Self {
        self.raw(b"\r\n")
    }

    pub fn finish(&mut self) -> Encoded {
        let mut chunks = std::mem::take(&mut self.done);
        chunks.push(std::mem::take(&mut self.current));
        Encoded { chunks }
    }
}

/// Bytes allowed in an unquoted astring.
const fn is_astring_char(b: u8) -> bool {
    b > 0x20
        && b < 0x7F
        && !matches!(b, b'(' | b')' | b'{' | b'%' | b'*' | b'"' | b'\\')
}

/// Bytes allowed in an atom; unlike astrings, `]` is excluded.
pub(super) const fn is_atom_char(b: u8) -> bool {
    is_astring_char(b) && b != b']'
}

/// True for a non-empty atom.
pub(super) fn is_atom(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(is_atom_char)
}

/// CR, LF, NUL and non-ASCII bytes cannot appear inside a quoted string.
fn needs_literal(s: &str) -> bool {
    s.bytes()
        .any(|b| b == b'\r' || b == b'\n' || b == 0 || !b.is_ascii())
}
