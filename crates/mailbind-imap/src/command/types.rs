//! Arguments of SEARCH and FETCH.

use super::serialize::{is_atom, is_atom_char};
use crate::error::{Error, Result};
use crate::types::UidSet;

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// One FETCH data item to request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchAttribute {
    /// `UID`
    Uid,
    /// `FLAGS`
    Flags,
    /// `INTERNALDATE`
    InternalDate,
    /// `RFC822.SIZE`
    Rfc822Size,
    /// `BODY[<section>]` or `BODY.PEEK[<section>]`. An empty section is
    /// the whole message.
    Body {
        /// Section specifier such as `HEADER`, `TEXT` or `1.2`.
        section: String,
        /// Use `BODY.PEEK` so the server does not set `\Seen`.
        peek: bool,
    },
}

impl FetchAttribute {
    /// `BODY.PEEK[<section>]`.
    #[must_use]
    pub fn peek(section: impl Into<String>) -> Self {
        Self::Body {
            section: section.into(),
            peek: true,
        }
    }

    /// Checks that a body section is a valid section specifier: empty, a
    /// part path like `1.2`, `HEADER`, `TEXT`, `HEADER.FIELDS (...)`, or a
    /// part path followed by one of those or `MIME`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] for anything else.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Body { section, .. } if !is_section_spec(section) => {
                Err(Error::InvalidArgument(format!("invalid body section {section:?}")))
            }
            _ => Ok(()),
        }
    }
}

/// Search key tree for SEARCH / UID SEARCH.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchCriteria {
    /// `ALL`
    All,
    /// `ANSWERED`
    Answered,
    /// `DELETED`
    Deleted,
    /// `FLAGGED`
    Flagged,
    /// `NEW`
    New,
    /// `SEEN`
    Seen,
    /// `UNSEEN`
    Unseen,
    /// `UNDELETED`
    Undeleted,
    /// `UNFLAGGED`
    Unflagged,
    /// `FROM <string>`
    From(String),
    /// `TO <string>`
    To(String),
    /// `CC <string>`
    Cc(String),
    /// `SUBJECT <string>`
    Subject(String),
    /// `BODY <string>`
    Body(String),
    /// `TEXT <string>`
    Text(String),
    /// `HEADER <field> <string>`
    Header(String, String),
    /// `KEYWORD <flag>`
    Keyword(String),
    /// `SINCE <date>`, date in `d-Mon-yyyy` form.
    Since(String),
    /// `BEFORE <date>`
    Before(String),
    /// `ON <date>`
    On(String),
    /// `LARGER <n>`
    Larger(u32),
    /// `SMALLER <n>`
    Smaller(u32),
    /// `UID <set>`
    Uid(UidSet),
    /// All keys must match (space separated).
    And(Vec<Self>),
    /// `OR <a> <b>`
    Or(Box<Self>, Box<Self>),
    /// `NOT <key>`
    Not(Box<Self>),
}

impl SearchCriteria {
    /// `OR a b`.
    #[must_use]
    pub fn or(a: Self, b: Self) -> Self {
        Self::Or(Box::new(a), Box::new(b))
    }

    /// `NOT key`.
    #[must_use]
    #[allow(clippy::should_implement_trait)]
    pub fn not(key: Self) -> Self {
        Self::Not(Box::new(key))
    }

    /// Returns true if any string argument is outside US-ASCII, in which
    /// case the server needs a CHARSET to interpret it.
    #[must_use]
    pub fn needs_charset(&self) -> bool {
        match self {
            Self::From(s)
            | Self::To(s)
            | Self::Cc(s)
            | Self::Subject(s)
            | Self::Body(s)
            | Self::Text(s) => !s.is_ascii(),
            Self::Header(name, value) => !name.is_ascii() || !value.is_ascii(),
            Self::And(keys) => keys.iter().any(Self::needs_charset),
            Self::Or(a, b) => a.needs_charset() || b.needs_charset(),
            Self::Not(key) => key.needs_charset(),
            _ => false,
        }
    }

    /// Checks the arguments that are sent unquoted: keywords must be atoms
    /// and dates must be `d-Mon-yyyy`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] naming the first offending key.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Keyword(flag) if !is_atom(flag) => {
                Err(Error::InvalidArgument(format!("invalid keyword {flag:?}")))
            }
            Self::Since(date) | Self::Before(date) | Self::On(date) if !is_search_date(date) => {
                Err(Error::InvalidArgument(format!("invalid search date {date:?}")))
            }
            Self::And(keys) => keys.iter().try_for_each(Self::validate),
            Self::Or(a, b) => {
                a.validate()?;
                b.validate()
            }
            Self::Not(key) => key.validate(),
            _ => Ok(()),
        }
    }
}

fn is_section_spec(spec: &str) -> bool {
    let mut rest = spec;
    let mut in_part = false;
    while let Some(len) = nz_number_len(rest) {
        in_part = true;
        rest = &rest[len..];
        match rest.strip_prefix('.') {
            Some(next) => rest = next,
            None => return rest.is_empty(),
        }
    }
    if !in_part && rest.is_empty() {
        return true;
    }
    is_section_text(rest, in_part)
}

fn nz_number_len(s: &str) -> Option<usize> {
    let len = s.bytes().take_while(u8::is_ascii_digit).count();
    (len > 0 && !s.starts_with('0')).then_some(len)
}

fn is_section_text(text: &str, in_part: bool) -> bool {
    let upper = text.to_ascii_uppercase();
    match upper.as_str() {
        "HEADER" | "TEXT" => true,
        "MIME" => in_part,
        _ => {
            let Some(rest) = upper.strip_prefix("HEADER.FIELDS") else {
                return false;
            };
            let rest = rest.strip_prefix(".NOT").unwrap_or(rest);
            rest.strip_prefix(" (")
                .and_then(|list| list.strip_suffix(')'))
                .is_some_and(|list| {
                    list.split(' ')
                        .all(|name| !name.is_empty() && name.bytes().all(is_atom_char))
                })
        }
    }
}

fn is_search_date(date: &str) -> bool {
    let mut parts = date.split('-');
    let (Some(day), Some(month), Some(year), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    (1..=2).contains(&day.len())
        && day.bytes().all(|b| b.is_ascii_digit())
        && MONTHS.iter().any(|m| m.eq_ignore_ascii_case(month))
        && year.len() == 4
        && year.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_section_specifiers() {
        for section in [
            "",
            "HEADER",
            "text",
            "1",
            "1.2.3",
            "2.MIME",
            "1.HEADER",
            "HEADER.FIELDS (Subject From)",
            "1.header.fields.not (Received)",
        ] {
            assert!(FetchAttribute::peek(section).validate().is_ok(), "{section}");
        }
        for section in [
            "MIME",
            "0",
            "1.",
            "1..2",
            "HEADER.FIELDS",
            "HEADER.FIELDS ()",
            "HEADER.FIELDS (a]b)",
            "HEADER]",
            "])\r\nX1 DELETE INBOX\r\nX2 NOOP ",
        ] {
            let err = FetchAttribute::peek(section).validate().unwrap_err();
            assert!(matches!(err, Error::InvalidArgument(_)), "{section}");
        }
    }

    #[test]
    fn test_search_arguments() {
        let valid = SearchCriteria::And(vec![
            SearchCriteria::Keyword("$Forwarded".into()),
            SearchCriteria::Since("1-Feb-2024".into()),
            SearchCriteria::not(SearchCriteria::On("28-dec-2023".into())),
        ]);
        assert!(valid.validate().is_ok());

        for bad in [
            SearchCriteria::Keyword("a\r\nX DELETE INBOX".into()),
            SearchCriteria::Keyword(String::new()),
            SearchCriteria::Keyword("\\Seen".into()),
            SearchCriteria::Before("2024-02-01".into()),
            SearchCriteria::Since("1-Feb-2024 ALL".into()),
            SearchCriteria::or(
                SearchCriteria::Seen,
                SearchCriteria::On("31-Foo-2024".into()),
            ),
        ] {
            assert!(
                matches!(bad.validate(), Err(Error::InvalidArgument(_))),
                "{bad:?}"
            );
        }
    }
}
