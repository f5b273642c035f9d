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

use std::fmt;
use std::num::NonZeroU32;

use crate::backend::{MessageId, SearchQuery};

/// Identifies one IMAP session for the lifetime of the process.
pub type SessionId = u64;

/// A message sequence number.
///
/// The sequence number of a message is one plus the number of messages in
/// the same mailbox with a lower id. Since membership in a mailbox is
/// derived from labels which other sessions can change at any moment,
/// sequence numbers shift without warning.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Seqnum(pub NonZeroU32);

impl Seqnum {
    // new() is not const
    pub const MIN: Self = unsafe { Seqnum(NonZeroU32::new_unchecked(1)) };

    pub fn of(seqnum: u32) -> Option<Self> {
        NonZeroU32::new(seqnum).map(Seqnum)
    }

    #[cfg(test)]
    pub fn u(seqnum: u32) -> Self {
        Seqnum::of(seqnum).unwrap()
    }

    pub fn to_index(self) -> usize {
        self.0.get() as usize - 1
    }

    /// Saturates at `u32::MAX`; mailboxes never get that large.
    pub fn from_index(ix: usize) -> Self {
        let n = (ix as u64 + 1).min(u64::from(u32::MAX)) as u32;
        Seqnum::of(n).unwrap_or(Seqnum::MIN)
    }
}

impl fmt::Display for Seqnum {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0.get())
    }
}

impl fmt::Debug for Seqnum {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Seqnum({})", self.0.get())
    }
}

/// Attributes that may be applied to mailboxes in `LIST` responses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum MailboxAttribute {
    Noselect,
}

impl MailboxAttribute {
    pub fn name(&self) -> &'static str {
        match self {
            &MailboxAttribute::Noselect => "\\Noselect",
        }
    }
}

impl fmt::Display for MailboxAttribute {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// What a mailbox name refers to in the backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MailboxKind {
    /// Every message in the index.
    AllMail,
    /// Messages whose thread carries the label.
    Label(String),
    /// Messages carrying the state.
    State(String),
    /// Messages matching a full-text term, from a `queries/...` name.
    Query(String),
}

impl MailboxKind {
    /// The query matching every message in the mailbox.
    pub fn query(&self) -> SearchQuery {
        match *self {
            MailboxKind::AllMail => SearchQuery::Null,
            MailboxKind::Label(ref key) | MailboxKind::State(ref key) => {
                SearchQuery::flag(key)
            },
            MailboxKind::Query(ref text) => SearchQuery::Term(text.clone()),
        }
    }

    /// The backend key whose modification stamp tracks the mailbox, if any.
    pub fn stamp_key(&self) -> Option<&str> {
        match *self {
            MailboxKind::Label(ref key) | MailboxKind::State(ref key) => {
                Some(key)
            },
            MailboxKind::AllMail | MailboxKind::Query(_) => None,
        }
    }
}

/// A mailbox which passed the checks for `SELECT` or `EXAMINE`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mailbox {
    pub name: String,
    pub kind: MailboxKind,
}

/// One entry in the mailbox list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MailboxInfo {
    pub name: String,
    pub attributes: Vec<MailboxAttribute>,
}

/// A mailbox created by `CREATE` which has no label behind it yet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingMailbox {
    pub name: String,
    pub attributes: Vec<MailboxAttribute>,
    pub owner: SessionId,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MailboxStatus {
    pub messages: u64,
    pub recent: u64,
    pub uid_next: u64,
    pub uid_validity: u64,
    pub unseen: u64,
}

/// A message resolved from a sequence set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MessageRef {
    pub id: MessageId,
    pub seqnum: Seqnum,
}
