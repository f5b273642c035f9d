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

use super::defs::*;
use crate::support::error::Error;

impl CommandProcessor {
    pub(super) fn cmd_store(
        &mut self,
        name: &str,
        set: s::SequenceSet,
        att: s::StoreAtt,
        uid: bool,
        sender: SendResponse<'_>,
    ) -> CmdResult {
        let selected = selected!(self)?;
        if selected.read_only {
            return Err(no(Error::MailboxReadOnly.to_string()));
        }

        let messages = self
            .store
            .resolve_sequence_set(&selected.mailbox, &set, uid)
            .map_err(map_error! {
                self, name,
                SequenceOutOfRange => (Bad, None),
            })?;

        for message in messages {
            let flags = self
                .store
                .store_flags(message.id, att.mode, &att.flags)
                .map_err(map_error!(self, name))?;

            let line = if uid {
                format!(
                    "{} FETCH (FLAGS ({}) UID {})",
                    message.seqnum,
                    flag_list(&flags),
                    message.id
                )
            } else {
                format!(
                    "{} FETCH (FLAGS ({}))",
                    message.seqnum,
                    flag_list(&flags)
                )
            };

            if !att.silent {
                sender(s::Response::data(line.clone()));
            }
            self.publish_to_others(&selected.mailbox.name, line);
        }

        success()
    }
}

/// Renders flags as the inside of a parenthesised flag list.
pub(super) fn flag_list(flags: &[String]) -> String {
    flags.join(" ")
}
