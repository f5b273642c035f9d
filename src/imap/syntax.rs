//-
// Copyright (c) 2020, Jason Lingle
//
// This file is part of Labelmap.
//
// Labelmap is free software: you can  redistribute it and/or modify it under the
// terms of  the GNU General Public  License as published by  the Free Software
// Foundation, either version  3 of the License, or (at  your option) any later
// version.
//
// Labelmap is distributed  in the hope that  it will be useful,  but WITHOUT ANY
// WARRANTY; without  even the implied  warranty of MERCHANTABILITY  or FITNESS
// FOR  A PARTICULAR  PURPOSE.  See the  GNU General  Public  License for  more
// details.
//
// You should have received a copy of the GNU General Public License along with
// Labelmap. If not, see <http://www.gnu.org/licenses/>.

//! The vocabulary of the protocol: parsed commands and the responses sent
//! back.
//!
//! Commands are produced by `parser` from a complete command line, with all
//! literals already inlined, and are owned values that outlive the input
//! buffer. Responses are written through `LexWriter` by the response writer.
//!
//! Untagged data responses are kept as pre-rendered bytes. Nearly all of them
//! are produced in exactly one place, and `FETCH` responses embed literals
//! which are simplest to render right where the data is at hand.

use std::borrow::Cow;
use std::fmt;
use std::io::{self, Write};

use chrono::prelude::*;
use thiserror::Error;

use super::lex::LexWriter;
use crate::backend::SearchQuery;

/// A lexical or grammatical failure in one command line.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{message} (at byte {position})")]
pub struct ParseError {
    pub message: String,
    pub position: usize,
    /// The tag of the failed command, if it got that far.
    pub tag: Option<String>,
}

impl ParseError {
    pub fn new(message: impl Into<String>, position: usize) -> Self {
        ParseError {
            message: message.into(),
            position,
            tag: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandLine {
    /// `None` only for the null command.
    pub tag: Option<String>,
    /// The upper-case command name, including any `UID ` prefix.
    pub name: String,
    pub cmd: Command,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// An empty line.
    Null,
    /// A tag with nothing after it.
    Missing,
    /// A command name which is unknown or not allowed in this state.
    Unrecognized {
        login_hint: bool,
    },
    Capability,
    StartTls,
    /// Also produced by `CHECK`, `SUBSCRIBE` and `UNSUBSCRIBE`.
    Noop,
    Logout,
    Authenticate {
        mechanism: String,
    },
    Login {
        userid: String,
        password: String,
    },
    Select(String),
    Examine(String),
    Create(String),
    Delete(String),
    Rename {
        src: String,
        dst: String,
    },
    List {
        reference: String,
        pattern: String,
    },
    Lsub {
        reference: String,
        pattern: String,
    },
    Status {
        mailbox: String,
        atts: Vec<StatusAtt>,
    },
    Append {
        mailbox: String,
        flags: Vec<String>,
        date_time: Option<DateTime<FixedOffset>>,
        message: Vec<u8>,
    },
    Idle,
    Close,
    Expunge,
    Search {
        charset: Option<String>,
        query: SearchQuery,
        uid: bool,
    },
    Fetch {
        set: SequenceSet,
        atts: Vec<FetchAtt>,
        uid: bool,
    },
    Store {
        set: SequenceSet,
        att: StoreAtt,
        uid: bool,
    },
    Copy {
        set: SequenceSet,
        mailbox: String,
        uid: bool,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeqNumber {
    Number(u64),
    /// `*`, the last message in the mailbox.
    Last,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeqItem {
    Single(SeqNumber),
    /// Inclusive at both ends, in whichever order the client wrote them.
    Range(SeqNumber, SeqNumber),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SequenceSet(pub Vec<SeqItem>);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusAtt {
    Messages,
    Recent,
    UidNext,
    UidValidity,
    Unseen,
}

impl StatusAtt {
    pub fn name(self) -> &'static str {
        match self {
            StatusAtt::Messages => "MESSAGES",
            StatusAtt::Recent => "RECENT",
            StatusAtt::UidNext => "UIDNEXT",
            StatusAtt::UidValidity => "UIDVALIDITY",
            StatusAtt::Unseen => "UNSEEN",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FetchAtt {
    Envelope,
    Flags,
    InternalDate,
    Rfc822,
    Rfc822Header,
    Rfc822Size,
    Rfc822Text,
    /// `BODY` without a section, i.e. the non-extensible body structure.
    Body,
    BodyStructure,
    Uid,
    BodySection {
        section: Section,
        partial: Option<Partial>,
        peek: bool,
    },
}

/// A `BODY[...]` section specifier.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Section {
    /// MIME part path; empty for the message itself.
    pub part: Vec<u32>,
    pub text: Option<SectionText>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SectionText {
    Header,
    Text,
    Mime,
    /// Field names, upper-cased.
    HeaderFields(Vec<String>),
    HeaderFieldsNot(Vec<String>),
}

/// `<offset.size>`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Partial {
    pub offset: u32,
    pub size: u32,
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (ix, p) in self.part.iter().enumerate() {
            if ix > 0 {
                write!(f, ".")?;
            }
            write!(f, "{}", p)?;
        }

        let text = match self.text {
            None => return Ok(()),
            Some(ref text) => text,
        };

        if !self.part.is_empty() {
            write!(f, ".")?;
        }

        let (name, fields) = match *text {
            SectionText::Header => ("HEADER", None),
            SectionText::Text => ("TEXT", None),
            SectionText::Mime => ("MIME", None),
            SectionText::HeaderFields(ref fields) => {
                ("HEADER.FIELDS", Some(fields))
            },
            SectionText::HeaderFieldsNot(ref fields) => {
                ("HEADER.FIELDS.NOT", Some(fields))
            },
        };
        write!(f, "{}", name)?;
        if let Some(fields) = fields {
            write!(f, " (")?;
            for (ix, field) in fields.iter().enumerate() {
                if ix > 0 {
                    write!(f, " ")?;
                }
                write!(f, "\"{}\"", field)?;
            }
            write!(f, ")")?;
        }

        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreMode {
    Set,
    Add,
    Remove,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreAtt {
    pub mode: StoreMode,
    pub silent: bool,
    pub flags: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RespCondType {
    Ok,
    No,
    Bad,
    Bye,
}

impl RespCondType {
    pub fn name(self) -> &'static str {
        match self {
            RespCondType::Ok => "OK",
            RespCondType::No => "NO",
            RespCondType::Bad => "BAD",
            RespCondType::Bye => "BYE",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CondResponse {
    pub cond: RespCondType,
    /// The response code, written in brackets, e.g. `TRYCREATE`.
    pub code: Option<Cow<'static, str>>,
    pub quip: Cow<'static, str>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Response {
    Cond(CondResponse),
    /// Anything else, pre-rendered, written after `* `.
    Data(Vec<u8>),
}

impl Response {
    pub fn cond(
        cond: RespCondType,
        code: Option<Cow<'static, str>>,
        quip: impl Into<Cow<'static, str>>,
    ) -> Self {
        Response::Cond(CondResponse {
            cond,
            code,
            quip: quip.into(),
        })
    }

    pub fn data(data: impl Into<Vec<u8>>) -> Self {
        Response::Data(data.into())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResponseLine {
    pub tag: Option<String>,
    pub response: Response,
}

impl ResponseLine {
    pub fn untagged(response: Response) -> Self {
        ResponseLine {
            tag: None,
            response,
        }
    }

    /// Writes the line, excluding the trailing CRLF.
    pub fn write_to(&self, w: &mut LexWriter<impl Write>) -> io::Result<()> {
        w.verbatim(self.tag.as_deref().unwrap_or("*"))?;
        w.verbatim(" ")?;
        match self.response {
            Response::Cond(ref cr) => {
                w.verbatim(cr.cond.name())?;
                if let Some(ref code) = cr.code {
                    w.verbatim(" [")?;
                    w.verbatim(code)?;
                    w.verbatim("]")?;
                }
                if !cr.quip.is_empty() {
                    w.verbatim(" ")?;
                    w.verbatim(&cr.quip)?;
                }
            },
            Response::Data(ref data) => w.raw(data)?,
        }
        Ok(())
    }
}
