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

use std::io;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// The mailbox name is malformed or refers to nothing.
    ///
    /// The payload is the full text reported to the client.
    #[error("{0}")]
    NoMailbox(String),
    /// The destination of an APPEND or COPY does not exist.
    #[error("{0} doesn't exist")]
    NxMailbox(String),
    #[error("{0}")]
    MailboxExists(String),
    #[error("{0}")]
    NotSelectable(String),
    #[error("{0}")]
    InvalidQuery(String),
    #[error("{0}")]
    SpecialMailbox(String),
    #[error("Mailbox is read-only")]
    MailboxReadOnly,
    #[error("can't find message {0}")]
    NxMessage(u64),
    #[error("Message sequence number out of range")]
    SequenceOutOfRange,
    #[error("unsupported authentication mechanism {0}")]
    UnsupportedMechanism(String),
    #[error("invalid message: {0}")]
    InvalidMessage(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}
