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

use crate::backend::{MessageId, MessageInfo, ParsedMessage};
use crate::support::error::Error;

use super::mail_store::MailStore;
use super::model::{MessageRef, Seqnum};

/// A message being looked at by one command.
///
/// The index record, raw bytes and parse are each loaded the first time they
/// are needed and kept until the handle is dropped.
pub struct MessageHandle<'a> {
    store: &'a MailStore,
    id: MessageId,
    seqnum: Seqnum,
    info: Option<MessageInfo>,
    content: Option<(Vec<u8>, ParsedMessage)>,
}

impl<'a> MessageHandle<'a> {
    pub(super) fn new(store: &'a MailStore, message: MessageRef) -> Self {
        MessageHandle {
            store,
            id: message.id,
            seqnum: message.seqnum,
            info: None,
            content: None,
        }
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn seqnum(&self) -> Seqnum {
        self.seqnum
    }

    pub fn info(&mut self) -> Result<&MessageInfo, Error> {
        let info = match self.info.take() {
            Some(info) => info,
            None => self.store.load(self.id)?,
        };
        Ok(&*self.info.get_or_insert(info))
    }

    pub fn flags(&mut self) -> Result<Vec<String>, Error> {
        let store = self.store;
        Ok(store.flags_of(self.info()?))
    }

    /// The raw message and its parse.
    pub fn content(&mut self) -> Result<(&[u8], &ParsedMessage), Error> {
        let content = match self.content.take() {
            Some(content) => content,
            None => {
                let raw = {
                    let store = self.store;
                    store.read_raw(self.info()?)?
                };
                let parsed = self.store.parse(&raw)?;
                (raw, parsed)
            },
        };

        let &mut (ref raw, ref parsed) = self.content.get_or_insert(content);
        Ok((&raw[..], parsed))
    }

    /// Drops the cached index record, e.g. after the flags changed.
    pub fn invalidate(&mut self) {
        self.info = None;
    }
}
