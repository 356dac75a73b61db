//! Runtime IMAP protocol driver.
//!
//! `Client` runs one command at a time: it writes the command (pausing for
//! `+` continuations at each synchronizing literal), collects untagged data
//! and finishes at the tagged completion. Which commands are valid in which
//! state is left to the caller.

#![allow(clippy::missing_errors_doc)]

use std::future::Future;
use std::io;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, trace};

use super::framed::FramedStream;
use crate::command::{Command, FetchAttribute, SearchCriteria, TagGenerator};
use crate::parser::{FetchItem, Response, ResponseParser, UntaggedResponse};
use crate::types::{
    Capability, ListResponse, Mailbox, MailboxStatus, ResponseCode, SeqNum, Status, Uid, UidSet,
};
use crate::{Error, Result};

/// How the server greeted us.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Greeting {
    /// `* OK`: login required.
    Ok,
    /// `* PREAUTH`: already authenticated.
    PreAuth,
}

/// Data returned with a successful tagged completion.
#[derive(Debug)]
struct Completion {
    untagged: Vec<UntaggedResponse>,
    code: Option<ResponseCode>,
}

/// IMAP client over any byte stream.
pub struct Client<S> {
    framed: FramedStream<S>,
    tags: TagGenerator,
    capabilities: Vec<Capability>,
    io_timeout: Option<Duration>,
}

impl<S> std::fmt::Debug for Client<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("tags", &self.tags)
            .field("capabilities", &self.capabilities)
            .field("io_timeout", &self.io_timeout)
            .finish_non_exhaustive()
    }
}

impl<S> Client<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps a freshly connected stream. Call [`Client::read_greeting`]
    /// before anything else.
    pub fn new(stream: S) -> Self {
        Self::with_tags(stream, TagGenerator::default())
    }

    /// Wraps a stream, continuing an existing tag sequence. Used after
    /// STARTTLS so tags stay unique for the whole connection.
    pub fn with_tags(stream: S, tags: TagGenerator) -> Self {
        Self {
            framed: FramedStream::new(stream),
            tags,
            capabilities: Vec::new(),
            io_timeout: None,
        }
    }

    /// Bounds every exchange by `timeout`.
    #[must_use]
    pub fn with_io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = Some(timeout);
        self
    }

    /// Capabilities last advertised by the server.
    #[must_use]
    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    /// True if `cap` was advertised.
    #[must_use]
    pub fn has_capability(&self, cap: &Capability) -> bool {
        self.capabilities.contains(cap)
    }

    /// True if `AUTH=<mechanism>` was advertised.
    #[must_use]
    pub fn supports_auth(&self, mechanism: &str) -> bool {
        self.capabilities.iter().any(|c| c.is_auth(mechanism))
    }

    /// Reads the server greeting. `* BYE` fails with [`Error::Bye`].
    pub async fn read_greeting(&mut self) -> Result<Greeting> {
        let deadline = self.io_timeout;
        let response = with_deadline(deadline, self.read_parsed()).await?;

        let (status, code, text) = match response {
            Response::Untagged(UntaggedResponse::Status { status, code, text }) => {
                (status, code, text)
            }
            other => {
                return Err(Error::Protocol(format!("expected greeting, got {other:?}")));
            }
        };
        self.absorb_code(code.as_ref());
        debug!(?status, %text, "server greeting");

        match status {
            Status::Ok => Ok(Greeting::Ok),
            Status::PreAuth => Ok(Greeting::PreAuth),
            Status::Bye => Err(Error::Bye(text)),
            Status::No | Status::Bad => Err(Error::Protocol(format!(
                "greeting with status {status:?}: {text}"
            ))),
        }
    }

    /// Sends CAPABILITY and returns the refreshed list.
    pub async fn capability(&mut self) -> Result<Vec<Capability>> {
        self.execute(&Command::Capability).await?;
        Ok(self.capabilities.clone())
    }

    /// Sends STARTTLS and hands back the raw stream for the TLS handshake,
    /// along with the tag sequence to continue with.
    ///
    /// Capabilities are discarded; they must be requested again over TLS.
    pub async fn starttls(mut self) -> Result<(S, TagGenerator)> {
        self.execute(&Command::StartTls).await?;
        if self.framed.has_buffered_input() {
            return Err(Error::Protocol(
                "server sent data after STARTTLS completion".to_string(),
            ));
        }
        Ok((self.framed.into_inner(), self.tags))
    }

    /// LOGIN with a username and password.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<()> {
        let command = Command::Login {
            username: username.to_string(),
            password: password.to_string(),
        };
        self.execute(&command).await.map(drop)
    }

    /// AUTHENTICATE PLAIN (RFC 4616) without an initial response.
    pub async fn authenticate_plain(&mut self, username: &str, password: &str) -> Result<()> {
        let deadline = self.io_timeout;
        with_deadline(deadline, self.sasl_plain(username, password)).await
    }

    async fn sasl_plain(&mut self, username: &str, password: &str) -> Result<()> {
        let command = Command::Authenticate {
            mechanism: "PLAIN".to_string(),
        };
        let tag = self.tags.next_tag();
        debug!(%tag, command = command.name(), "sending command");
        self.framed.write_all(&command.encode(&tag).to_bytes()).await?;

        let mut untagged = Vec::new();
        self.await_continuation(&command, &tag, &mut untagged).await?;

        let mut message = Vec::with_capacity(username.len() + password.len() + 2);
        message.push(0);
        message.extend_from_slice(username.as_bytes());
        message.push(0);
        message.extend_from_slice(password.as_bytes());
        let mut line = BASE64.encode(&message).into_bytes();
        line.extend_from_slice(b"\r\n");
        self.framed.write_all(&line).await?;

        self.read_completion(&command, &tag, untagged).await.map(drop)
    }

    /// SELECT a mailbox and collect its status.
    pub async fn select(&mut self, mailbox: &Mailbox) -> Result<MailboxStatus> {
        let command = Command::Select {
            mailbox: mailbox.clone(),
        };
        let completion = self.execute(&command).await?;

        let mut status = MailboxStatus {
            read_only: matches!(completion.code, Some(ResponseCode::ReadOnly)),
            ..MailboxStatus::default()
        };
        for data in completion.untagged {
            match data {
                UntaggedResponse::Exists(n) => status.exists = n,
                UntaggedResponse::Recent(n) => status.recent = n,
                UntaggedResponse::Flags(flags) => status.flags = flags,
                UntaggedResponse::Status {
                    code: Some(code), ..
                } => match code {
                    ResponseCode::UidValidity(v) => status.uid_validity = Some(v),
                    ResponseCode::UidNext(uid) => status.uid_next = Some(uid),
                    ResponseCode::Unseen(seq) => status.unseen = Some(seq),
                    ResponseCode::PermanentFlags(flags) => status.permanent_flags = flags,
                    _ => {}
                },
                _ => {}
            }
        }
        Ok(status)
    }

    /// LIST `reference` `pattern`.
    pub async fn list(&mut self, reference: &str, pattern: &str) -> Result<Vec<ListResponse>> {
        let command = Command::List {
            reference: reference.to_string(),
            pattern: pattern.to_string(),
        };
        let completion = self.execute(&command).await?;
        Ok(completion
            .untagged
            .into_iter()
            .filter_map(|data| match data {
                UntaggedResponse::List(list) => Some(list),
                _ => None,
            })
            .collect())
    }

    /// UID SEARCH; returns matching UIDs in server order.
    pub async fn uid_search(
        &mut self,
        criteria: &SearchCriteria,
        charset: Option<&str>,
    ) -> Result<Vec<Uid>> {
        let command = Command::UidSearch {
            criteria: criteria.clone(),
            charset: charset.map(str::to_string),
        };
        let completion = self.execute(&command).await?;
        Ok(completion
            .untagged
            .into_iter()
            .filter_map(|data| match data {
                UntaggedResponse::Search(nums) => Some(nums),
                _ => None,
            })
            .flatten()
            .filter_map(Uid::new)
            .collect())
    }

    /// UID FETCH; returns each FETCH response as (sequence number, items).
    pub async fn uid_fetch(
        &mut self,
        uids: &UidSet,
        items: &[FetchAttribute],
    ) -> Result<Vec<(SeqNum, Vec<FetchItem>)>> {
        let command = Command::UidFetch {
            uids: uids.clone(),
            items: items.to_vec(),
        };
        let completion = self.execute(&command).await?;
        Ok(completion
            .untagged
            .into_iter()
            .filter_map(|data| match data {
                UntaggedResponse::Fetch { seq, items } => Some((seq, items)),
                _ => None,
            })
            .collect())
    }

    /// NOOP; returns any untagged updates the server flushed.
    pub async fn noop(&mut self) -> Result<Vec<UntaggedResponse>> {
        Ok(self.execute(&Command::Noop).await?.untagged)
    }

    /// LOGOUT. A server that closes right after its BYE counts as success.
    pub async fn logout(&mut self) -> Result<()> {
        match self.execute(&Command::Logout).await {
            Ok(_) => Ok(()),
            Err(Error::Io(e)) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Returns the underlying stream.
    pub fn into_inner(self) -> S {
        self.framed.into_inner()
    }

    async fn execute(&mut self, command: &Command) -> Result<Completion> {
        command.validate()?;
        let deadline = self.io_timeout;
        with_deadline(deadline, self.exchange(command)).await
    }

    async fn exchange(&mut self, command: &Command) -> Result<Completion> {
        let tag = self.tags.next_tag();
        let encoded = command.encode(&tag);
        debug!(%tag, command = command.name(), "sending command");

        let mut untagged = Vec::new();
        let Some((last, literals)) = encoded.chunks().split_last() else {
            return Err(Error::Protocol("empty command".to_string()));
        };
        for chunk in literals {
            self.framed.write_all(chunk).await?;
            self.await_continuation(command, &tag, &mut untagged).await?;
        }
        self.framed.write_all(last).await?;

        self.read_completion(command, &tag, untagged).await
    }

    async fn await_continuation(
        &mut self,
        command: &Command,
        tag: &str,
        untagged: &mut Vec<UntaggedResponse>,
    ) -> Result<()> {
        loop {
            match self.read_parsed().await? {
                Response::Continuation { .. } => return Ok(()),
                Response::Untagged(data) => self.collect(command, data, untagged)?,
                Response::Tagged {
                    tag: done,
                    status,
                    text,
                    ..
                } if done.as_str() == tag => {
                    return Err(match status {
                        Status::No => Error::No(text),
                        Status::Bad => Error::Bad(text),
                        _ => Error::Protocol(format!(
                            "{} completed before its continuation",
                            command.name()
                        )),
                    });
                }
                Response::Tagged { tag: other, .. } => {
                    return Err(Error::Protocol(format!("unexpected tag {other}")));
                }
            }
        }
    }

    async fn read_completion(
        &mut self,
        command: &Command,
        tag: &str,
        mut untagged: Vec<UntaggedResponse>,
    ) -> Result<Completion> {
        loop {
            match self.read_parsed().await? {
                Response::Untagged(data) => self.collect(command, data, &mut untagged)?,
                Response::Tagged {
                    tag: done,
                    status,
                    code,
                    text,
                } if done.as_str() == tag => {
                    self.absorb_code(code.as_ref());
                    debug!(%tag, ?status, "command completed");
                    return match status {
                        Status::Ok => Ok(Completion { untagged, code }),
                        Status::No => Err(Error::No(text)),
                        Status::Bad => Err(Error::Bad(text)),
                        Status::PreAuth | Status::Bye => Err(Error::Protocol(format!(
                            "tagged {status:?} for {}",
                            command.name()
                        ))),
                    };
                }
                Response::Tagged { tag: other, .. } => {
                    return Err(Error::Protocol(format!("unexpected tag {other}")));
                }
                Response::Continuation { .. } => {
                    return Err(Error::Protocol(format!(
                        "unexpected continuation during {}",
                        command.name()
                    )));
                }
            }
        }
    }

    fn collect(
        &mut self,
        command: &Command,
        data: UntaggedResponse,
        untagged: &mut Vec<UntaggedResponse>,
    ) -> Result<()> {
        match &data {
            UntaggedResponse::Status {
                status: Status::Bye,
                text,
                ..
            } if !matches!(command, Command::Logout) => {
                return Err(Error::Bye(text.clone()));
            }
            UntaggedResponse::Status { code, .. } => self.absorb_code(code.as_ref()),
            UntaggedResponse::Capability(caps) => self.capabilities.clone_from(caps),
            _ => {}
        }
        untagged.push(data);
        Ok(())
    }

    fn absorb_code(&mut self, code: Option<&ResponseCode>) {
        if let Some(ResponseCode::Capability(caps)) = code {
            self.capabilities.clone_from(caps);
        }
    }

    async fn read_parsed(&mut self) -> Result<Response> {
        let bytes = self.framed.read_response().await?;
        trace!(len = bytes.len(), "response received");
        ResponseParser::parse(&bytes)
    }
}

async fn with_deadline<T>(
    deadline: Option<Duration>,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    match deadline {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| Error::Timeout(limit))?,
        None => fut.await,
    }
}
