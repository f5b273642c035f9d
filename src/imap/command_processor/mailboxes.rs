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
use std::io::{self, Write};

use lazy_static::lazy_static;
use log::{info, warn};
use regex::Regex;

use super::defs::*;
use crate::account::model::*;
use crate::imap::lex::LexWriter;
use crate::imap::parser::ConnectionState;
use crate::support::error::Error;

lazy_static! {
    /// Names which may be neither deleted nor renamed, whatever the store
    /// thinks of them.
    static ref PROTECTED_NAME: Regex =
        Regex::new("(?i)^(INBOX|ml|queries)$").unwrap();
}

impl CommandProcessor {
    pub(super) fn cmd_select(
        &mut self,
        name: &str,
        mailbox: String,
        read_only: bool,
        sender: SendResponse<'_>,
    ) -> CmdResult {
        // A failed SELECT still leaves the client with nothing selected.
        self.deselect();

        let mailbox = self.store.selectable_mailbox(&mailbox).map_err(
            map_error! {
                self, name,
                NoMailbox | NotSelectable | InvalidQuery => (No, None),
            },
        )?;
        let status = self
            .store
            .mailbox_status(&mailbox.name)
            .map_err(map_error!(self, name))?;

        sender(s::Response::data(format!("{} EXISTS", status.messages)));
        sender(s::Response::data(format!("{} RECENT", status.recent)));
        sender(s::Response::cond(
            s::RespCondType::Ok,
            Some(Cow::Owned(format!("UIDVALIDITY {}", status.uid_validity))),
            "UIDs valid",
        ));
        sender(s::Response::cond(
            s::RespCondType::Ok,
            Some(Cow::Owned(format!("UIDNEXT {}", status.uid_next))),
            "Predicted next UID",
        ));
        sender(s::Response::data(FLAGS));
        sender(s::Response::cond(
            s::RespCondType::Ok,
            Some(Cow::Borrowed(PERMANENT_FLAGS)),
            "Limited",
        ));

        info!(
            "{} {} {} ({} messages)",
            self.log_prefix, name, mailbox.name, status.messages
        );
        self.registry
            .set_mailbox(self.session, Some(&mailbox.name));
        // Anything queued so far concerns whatever was selected before.
        self.outbox.take(None);
        self.selected = Some(Selected { mailbox, read_only });
        self.state = ConnectionState::Selected;

        success_with(if read_only { "READ-ONLY" } else { "READ-WRITE" })
    }

    pub(super) fn cmd_create(
        &mut self,
        name: &str,
        mailbox: String,
    ) -> CmdResult {
        self.store
            .create_mailbox(&mailbox, self.session)
            .map_err(map_error! {
                self, name,
                NoMailbox | MailboxExists | InvalidQuery => (No, None),
            })?;
        info!("{} Created {}", self.log_prefix, mailbox);
        success()
    }

    pub(super) fn cmd_delete(
        &mut self,
        name: &str,
        mailbox: String,
    ) -> CmdResult {
        if PROTECTED_NAME.is_match(&mailbox) {
            return Err(no(format!("can't delete {}", mailbox)));
        }

        self.store.delete_mailbox(&mailbox).map_err(map_error! {
            self, name,
            NoMailbox | SpecialMailbox | InvalidQuery => (No, None),
        })?;
        info!("{} Deleted {}", self.log_prefix, mailbox);
        success()
    }

    pub(super) fn cmd_rename(
        &mut self,
        name: &str,
        src: String,
        dst: String,
    ) -> CmdResult {
        if PROTECTED_NAME.is_match(&src) {
            return Err(no(format!("can't rename {}", src)));
        }

        self.store.rename_mailbox(&src, &dst).map_err(map_error! {
            self, name,
            NoMailbox | MailboxExists | SpecialMailbox | InvalidQuery =>
                (No, None),
        })?;
        info!("{} Renamed {} to {}", self.log_prefix, src, dst);
        success()
    }

    /// `LIST` and `LSUB`, which are the same thing since every mailbox
    /// counts as subscribed.
    pub(super) fn cmd_list(
        &mut self,
        name: &str,
        reference: String,
        pattern: String,
        sender: SendResponse<'_>,
    ) -> CmdResult {
        if !reference.is_empty() {
            return Err(no(format!("{} failed", name)));
        }

        if pattern.is_empty() {
            sender(s::Response::data(format!(
                "{} (\\Noselect) \"/\" \"\"",
                name
            )));
            return success();
        }

        let pattern = list_pattern(&pattern).map_err(|e| {
            warn!("{} Bad {} pattern: {}", self.log_prefix, name, e);
            no(format!("{} failed", name))
        })?;
        let mailboxes =
            self.store.list_mailboxes().map_err(map_error!(self, name))?;

        for mailbox in mailboxes {
            if !pattern.is_match(&mailbox.name) {
                continue;
            }

            let mut line = Vec::new();
            write_list_line(&mut LexWriter::new(&mut line), name, &mailbox)
                .map_err(Error::from)
                .map_err(map_error!(self, name))?;
            sender(s::Response::data(line));
        }

        success()
    }

    pub(super) fn cmd_status(
        &mut self,
        name: &str,
        mailbox: String,
        atts: Vec<s::StatusAtt>,
        sender: SendResponse<'_>,
    ) -> CmdResult {
        let status = self.store.mailbox_status(&mailbox).map_err(
            map_error! {
                self, name,
                NoMailbox | InvalidQuery => (No, None),
            },
        )?;

        let mut line = Vec::new();
        write_status_line(
            &mut LexWriter::new(&mut line),
            &mailbox,
            &atts,
            &status,
        )
        .map_err(Error::from)
        .map_err(map_error!(self, name))?;

        sender(s::Response::data(line));
        success()
    }

    /// Deselects the mailbox, first silently expunging it if it is
    /// writable.
    pub(super) fn cmd_close(&mut self, name: &str) -> CmdResult {
        let selected = selected!(self)?;
        if !selected.read_only {
            match self.store.expunge(&selected.mailbox) {
                Ok(expunged) => {
                    for seqnum in expunged {
                        self.publish_to_others(
                            &selected.mailbox.name,
                            format!("{} EXPUNGE", seqnum),
                        );
                    }
                },
                Err(e) => {
                    warn!("{} Implicit EXPUNGE failed: {}", self.log_prefix, e)
                },
            }
        }

        info!("{} {} {}", self.log_prefix, name, selected.mailbox.name);
        self.deselect();
        success()
    }
}

/// Compiles a `LIST` pattern, where `*` matches anything and `%` matches
/// anything but the hierarchy delimiter.
fn list_pattern(pattern: &str) -> Result<Regex, Error> {
    let mut re = String::from("^");
    let mut literal = String::new();
    for ch in pattern.chars() {
        let wildcard = match ch {
            '*' => ".*",
            '%' => "[^/]*",
            ch => {
                literal.push(ch);
                continue;
            },
        };
        re.push_str(&regex::escape(&literal));
        literal.clear();
        re.push_str(wildcard);
    }
    re.push_str(&regex::escape(&literal));
    re.push('$');

    Regex::new(&re).map_err(|e| Error::NoMailbox(e.to_string()))
}

fn write_status_line(
    w: &mut LexWriter<impl Write>,
    mailbox: &str,
    atts: &[s::StatusAtt],
    status: &MailboxStatus,
) -> io::Result<()> {
    w.verbatim("STATUS ")?;
    w.quoted(mailbox)?;
    w.verbatim(" (")?;
    for (ix, &att) in atts.iter().enumerate() {
        if ix > 0 {
            w.verbatim(" ")?;
        }
        w.verbatim(att.name())?;
        w.verbatim(" ")?;
        w.num(match att {
            s::StatusAtt::Messages => status.messages,
            s::StatusAtt::Recent => status.recent,
            s::StatusAtt::UidNext => status.uid_next,
            s::StatusAtt::UidValidity => status.uid_validity,
            s::StatusAtt::Unseen => status.unseen,
        })?;
    }
    w.verbatim(")")
}

fn write_list_line(
    w: &mut LexWriter<impl Write>,
    name: &str,
    mailbox: &MailboxInfo,
) -> io::Result<()> {
    w.verbatim(name)?;
    w.verbatim(" (")?;
    for (ix, attr) in mailbox.attributes.iter().enumerate() {
        if ix > 0 {
            w.verbatim(" ")?;
        }
        w.verbatim(attr.name())?;
    }
    w.verbatim(") \"/\" ")?;
    w.quoted(&mailbox.name)
}
