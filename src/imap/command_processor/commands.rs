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

use log::{debug, info};

use super::defs::*;
use crate::imap::parser::ConnectionState;

impl CommandProcessor {
    /// Return the greeting line to send to the client.
    pub fn greet(&self) -> s::ResponseLine {
        s::ResponseLine::untagged(s::Response::cond(
            s::RespCondType::Ok,
            None,
            format!(
                "{} version {}",
                self.config.identity.name,
                env!("CARGO_PKG_VERSION")
            ),
        ))
    }

    /// Handles a regular command, i.e., one that the protocol level does not
    /// give special treatment to.
    ///
    /// `sender` is called with untagged responses as they are produced,
    /// followed by any notifications queued for this session.
    ///
    /// Returns the final response, which is tagged unless the command line
    /// had no tag.
    pub fn handle_command(
        &mut self,
        command_line: s::CommandLine,
        sender: SendResponse<'_>,
    ) -> s::ResponseLine {
        let s::CommandLine { tag, name, cmd } = command_line;

        // Sequence numbers must stay put while the client may be relying on
        // them.
        let defer_expunge = match cmd {
            s::Command::Fetch { .. }
            | s::Command::Store { .. }
            | s::Command::Search { uid: false, .. } => true,
            _ => false,
        };

        let res = match cmd {
            s::Command::Null => Err(bad("Null command")),
            s::Command::Missing => Err(bad("Missing command")),
            s::Command::Unrecognized { login_hint } => {
                Err(bad(if login_hint {
                    "Command unrecognized/login please"
                } else {
                    "Command unrecognized"
                }))
            },
            s::Command::Capability => self.cmd_capability(sender),
            s::Command::StartTls => Err(no(
                "STARTTLS failed - TLS is not available on this listener",
            )),
            s::Command::Noop => success(),
            s::Command::Logout => self.cmd_log_out(sender),
            s::Command::Authenticate { .. } => {
                Err(bad("AUTHENTICATE must be handled by the connection"))
            },
            s::Command::Login { userid, password } => {
                self.cmd_log_in(userid, password)
            },
            s::Command::Select(mailbox) => {
                self.cmd_select(&name, mailbox, false, sender)
            },
            s::Command::Examine(mailbox) => {
                self.cmd_select(&name, mailbox, true, sender)
            },
            s::Command::Create(mailbox) => self.cmd_create(&name, mailbox),
            s::Command::Delete(mailbox) => self.cmd_delete(&name, mailbox),
            s::Command::Rename { src, dst } => {
                self.cmd_rename(&name, src, dst)
            },
            s::Command::List { reference, pattern }
            | s::Command::Lsub { reference, pattern } => {
                self.cmd_list(&name, reference, pattern, sender)
            },
            s::Command::Status { mailbox, atts } => {
                self.cmd_status(&name, mailbox, atts, sender)
            },
            s::Command::Append {
                mailbox,
                flags,
                date_time,
                message,
            } => self.cmd_append(&name, mailbox, flags, date_time, message),
            s::Command::Idle => {
                Err(bad("IDLE must be handled by the connection"))
            },
            s::Command::Close => self.cmd_close(&name),
            s::Command::Expunge => self.cmd_expunge(&name, sender),
            s::Command::Search {
                charset,
                query,
                uid,
            } => self.cmd_search(&name, charset, query, uid, sender),
            s::Command::Fetch { set, atts, uid } => {
                self.cmd_fetch(&name, set, atts, uid, sender)
            },
            s::Command::Store { set, att, uid } => {
                self.cmd_store(&name, set, att, uid, sender)
            },
            s::Command::Copy { set, mailbox, uid } => {
                self.cmd_copy(&name, set, mailbox, uid)
            },
        };

        if !self.logged_out() {
            for notification in self.take_notifications(defer_expunge) {
                sender(notification);
            }
        }

        let mut response = match res {
            Ok(res) => res,
            Err(res) => res,
        };
        if let s::Response::Cond(ref mut cr) = response {
            if s::RespCondType::Ok == cr.cond && cr.quip.is_empty() {
                cr.quip = Cow::Owned(format!("{} completed", name));
            }
        }

        s::ResponseLine { tag, response }
    }

    /// The tagged response for a line which could not be parsed.
    pub fn parse_error(&self, e: s::ParseError) -> s::ResponseLine {
        debug!("{} Parse error: {}", self.log_prefix, e);
        s::ResponseLine {
            tag: e.tag,
            response: bad(format!("parse error: {}", e.message)),
        }
    }

    /// The tagged `OK` which ends an `IDLE`.
    pub fn idle_done(&self, tag: Option<String>) -> s::ResponseLine {
        s::ResponseLine {
            tag,
            response: s::Response::cond(
                s::RespCondType::Ok,
                None,
                "IDLE completed",
            ),
        }
    }

    fn cmd_capability(&mut self, sender: SendResponse<'_>) -> CmdResult {
        sender(s::Response::data(format!("CAPABILITY {}", CAPABILITIES)));
        success()
    }

    fn cmd_log_out(&mut self, sender: SendResponse<'_>) -> CmdResult {
        info!("{} Logging out", self.log_prefix);
        self.deselect();
        self.store.logout_session(self.session);
        self.state = ConnectionState::Logout;
        sender(s::Response::cond(
            s::RespCondType::Bye,
            None,
            "IMAP server terminating connection",
        ));
        success()
    }
}
