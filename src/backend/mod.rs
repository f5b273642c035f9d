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

//! The services Labelmap sits in front of.
//!
//! The authoritative store of mail is a label-and-state metadata index plus a
//! raw byte store; neither knows anything about IMAP. They are reached only
//! through the traits defined here. `memory` provides in-process
//! implementations, which the server uses by default and all tests use.

use std::collections::BTreeSet;
use std::fmt;
use std::ops::Range;

use crate::support::error::Error;

pub mod memory;
pub mod parser;
pub mod query;

pub use self::query::{Cmp, PropertyValue, SearchQuery};

/// The index's identifier for a message. This doubles as the IMAP UID.
pub type MessageId = u64;
pub type ThreadId = u64;
/// Where the raw store put a message.
pub type Location = u64;

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Person {
    pub name: Option<String>,
    pub email: String,
}

impl fmt::Display for Person {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.name {
            Some(ref name) => write!(f, "{} <{}>", name, self.email),
            None => write!(f, "{}", self.email),
        }
    }
}

/// The per-message record kept by the index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageInfo {
    pub id: MessageId,
    pub thread_id: ThreadId,
    /// Labels of the message's thread.
    pub labels: BTreeSet<String>,
    /// Binary attributes of this message alone.
    pub state: BTreeSet<String>,
    /// The `Date` header, as UNIX seconds.
    pub date: i64,
    /// When the message entered the index, as UNIX seconds.
    pub internal_date: i64,
    pub size: u64,
    pub location: Location,
}

/// One node of a message's MIME tree.
///
/// Byte ranges refer to the raw message the node was parsed from.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MimePart {
    /// Lower-case primary type, e.g. `text`.
    pub content_type: String,
    /// Lower-case subtype, e.g. `plain`.
    pub subtype: String,
    /// Content-Type parameters, names lower-cased.
    pub params: Vec<(String, String)>,
    pub content_id: Option<String>,
    pub description: Option<String>,
    pub encoding: String,
    pub disposition: Option<String>,
    pub filename: Option<String>,
    /// The header block, including the blank line which terminates it.
    pub header: Range<usize>,
    pub body: Range<usize>,
    pub lines: usize,
    pub children: Vec<MimePart>,
}

impl MimePart {
    pub fn is_multipart(&self) -> bool {
        "multipart" == self.content_type
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|&&(ref k, _)| k == name)
            .map(|&(_, ref v)| v.as_str())
    }
}

/// The result of parsing a raw message.
#[derive(Clone, Debug, Default)]
pub struct ParsedMessage {
    pub message_id: String,
    /// Content-derived identifier used to recognise re-deliveries.
    pub safe_id: String,
    pub from: Option<Person>,
    pub sender: Option<Person>,
    pub reply_to: Option<Person>,
    pub to: Vec<Person>,
    pub cc: Vec<Person>,
    pub bcc: Vec<Person>,
    pub subject: String,
    /// UNIX seconds.
    pub date: i64,
    /// Raw `Date` header, if there was one.
    pub date_header: Option<String>,
    pub refs: Vec<String>,
    pub in_reply_to: Vec<String>,
    /// The mailing list the message was sent through, if any.
    pub list_name: Option<String>,
    pub list_post: Option<String>,
    pub list_subscribe: Option<String>,
    pub list_unsubscribe: Option<String>,
    pub mail_count: Option<u64>,
    /// Unfolded header fields, names lower-cased, in message order.
    pub headers: Vec<(String, String)>,
    pub root: MimePart,
    pub snippet: String,
    /// Everything worth matching full-text queries against.
    pub text: String,
    pub has_attachment: bool,
    pub signed: bool,
    pub encrypted: bool,
}

impl ParsedMessage {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|&&(ref k, _)| k.eq_ignore_ascii_case(name))
            .map(|&(_, ref v)| v.as_str())
    }
}

/// The metadata index.
///
/// Labels live on threads; state lives on individual messages. Both are free
/// form strings as far as the index is concerned.
pub trait MetaIndex: Send + Sync {
    /// Returns the records of every message matching `query`, ascending by
    /// id.
    fn query(&self, query: &SearchQuery) -> Result<Vec<MessageInfo>, Error>;
    fn load_message_info(
        &self,
        id: MessageId,
    ) -> Result<Option<MessageInfo>, Error>;
    fn update_message_state(
        &self,
        id: MessageId,
        state: BTreeSet<String>,
    ) -> Result<(), Error>;
    fn update_thread_labels(
        &self,
        thread: ThreadId,
        labels: BTreeSet<String>,
    ) -> Result<(), Error>;
    fn add_message(
        &self,
        message: &ParsedMessage,
        state: BTreeSet<String>,
        labels: BTreeSet<String>,
        location: Location,
        internal_date: i64,
    ) -> Result<(MessageId, ThreadId), Error>;
    fn find_by_safe_id(
        &self,
        safe_id: &str,
    ) -> Result<Option<MessageId>, Error>;
    fn all_labels(&self) -> Result<BTreeSet<String>, Error>;
    /// The total number of messages in the index.
    fn size(&self) -> Result<u64, Error>;
    /// A stamp which increases whenever any message carrying `label` (as a
    /// label or as state) is added or modified.
    fn timestamp(&self, label: &str) -> Result<u64, Error>;
    fn touch_contact(&self, person: &Person) -> Result<(), Error>;
    /// Forget labels no thread carries any more.
    fn prune_labels(&self) -> Result<(), Error>;
}

pub trait RawStore: Send + Sync {
    fn add(&self, data: &[u8]) -> Result<Location, Error>;
    fn read(&self, location: Location) -> Result<Vec<u8>, Error>;
}

pub trait MessageParser: Send + Sync {
    fn parse(&self, data: &[u8]) -> Result<ParsedMessage, Error>;
}
