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

use std::borrow::Cow;

use chrono::prelude::*;
use log::{info, warn};

use super::defs::*;
use crate::account::special::ALL_MAIL;
use crate::support::error::Error;

impl CommandProcessor {
    pub(super) fn cmd_append(
        &mut self,
        name: &str,
        mailbox: String,
        flags: Vec<String>,
        date_time: Option<DateTime<FixedOffset>>,
        message: Vec<u8>,
    ) -> CmdResult {
        let id = self
            .store
            .append_mail(
                &message,
                &mailbox,
                &flags,
                date_time.map(|d| d.timestamp()),
            )
            .map_err(map_error! {
                self, name,
                NxMailbox => (No, Some(Cow::Borrowed("TRYCREATE"))),
                NoMailbox | NotSelectable | InvalidQuery | InvalidMessage =>
                    (No, None),
            })?;
        info!(
            "{} Appended {} bytes to {} as message {}",
            self.log_prefix,
            message.len(),
            mailbox,
            id
        );

        self.announce_exists(&mailbox);
        if ALL_MAIL != mailbox {
            self.announce_exists(ALL_MAIL);
        }
        success()
    }

    pub(super) fn cmd_copy(
        &mut self,
        name: &str,
        set: s::SequenceSet,
        mailbox: String,
        uid: bool,
    ) -> CmdResult {
        let selected = selected!(self)?;
        self.store.append_target(&mailbox).map_err(map_error! {
            self, name,
            NxMailbox => (No, Some(Cow::Borrowed("TRYCREATE"))),
            NoMailbox | NotSelectable | InvalidQuery => (No, None),
        })?;

        let messages = self
            .store
            .resolve_sequence_set(&selected.mailbox, &set, uid)
            .map_err(map_error! {
                self, name,
                SequenceOutOfRange => (Bad, None),
            })?;

        for message in &messages {
            self.store.copy_message(message.id, &mailbox).map_err(
                map_error! {
                    self, name,
                    NxMailbox => (No, Some(Cow::Borrowed("TRYCREATE"))),
                    NoMailbox | NotSelectable | InvalidQuery => (No, None),
                },
            )?;
        }
        info!(
            "{} Copied {} message(s) from {} to {}",
            self.log_prefix,
            messages.len(),
            selected.mailbox.name,
            mailbox
        );

        self.announce_exists(&mailbox);
        success()
    }

    pub(super) fn cmd_expunge(
        &mut self,
        name: &str,
        sender: SendResponse<'_>,
    ) -> CmdResult {
        let selected = selected!(self)?;
        if selected.read_only {
            return Err(no(Error::MailboxReadOnly.to_string()));
        }

        let expunged = self
            .store
            .expunge(&selected.mailbox)
            .map_err(map_error!(self, name))?;
        for seqnum in &expunged {
            let line = format!("{} EXPUNGE", seqnum);
            sender(s::Response::data(line.clone()));
            self.publish_to_others(&selected.mailbox.name, line);
        }

        info!(
            "{} Expunged {} message(s) from {}",
            self.log_prefix,
            expunged.len(),
            selected.mailbox.name
        );
        success()
    }

    pub(super) fn cmd_search(
        &mut self,
        name: &str,
        charset: Option<String>,
        query: crate::backend::SearchQuery,
        uid: bool,
        sender: SendResponse<'_>,
    ) -> CmdResult {
        let selected = selected!(self)?;
        if let Some(ref charset) = charset {
            if encoding_rs::Encoding::for_label(charset.as_bytes()).is_none()
            {
                return Err(s::Response::cond(
                    s::RespCondType::No,
                    Some(Cow::Borrowed("BADCHARSET")),
                    format!("Unsupported charset {}", charset),
                ));
            }
        }

        let hits = self
            .store
            .search(&selected.mailbox, &query)
            .map_err(map_error!(self, name))?;

        let mut line = "SEARCH".to_owned();
        for hit in hits {
            line.push(' ');
            if uid {
                line.push_str(&hit.id.to_string());
            } else {
                line.push_str(&hit.seqnum.to_string());
            }
        }

        sender(s::Response::data(line));
        success()
    }

    /// Tells every session with `mailbox` selected, including this one, how
    /// many messages it now has.
    fn announce_exists(&self, mailbox: &str) {
        match self.store.mailbox_status(mailbox) {
            Ok(status) => {
                self.publish(mailbox, format!("{} EXISTS", status.messages))
            },
            Err(e) => warn!(
                "{} Can't count messages in {}: {}",
                self.log_prefix, mailbox, e
            ),
        }
    }
}
