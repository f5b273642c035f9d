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
use std::sync::Arc;

use log::warn;

use crate::account::mail_store::MailStore;
use crate::account::model::*;
use crate::account::notify::{NotificationRegistry, Outbox};
use crate::backend::SearchQuery;
use crate::imap::parser::{
    self, CommandTable, ConnectionState, ParseContext,
};
use crate::support::{
    error::Error, log_prefix::LogPrefix, system_config::SystemConfig,
};

pub(super) use crate::imap::syntax as s;

pub(super) static CAPABILITIES: &str = "IMAP4REV1 IDLE";

/// The system flags every mailbox supports.
pub(super) static FLAGS: &str =
    "FLAGS (\\Answered \\Flagged \\Deleted \\Seen \\Draft)";
pub(super) static PERMANENT_FLAGS: &str =
    "PERMANENTFLAGS (\\Answered \\Flagged \\Draft \\Seen \\Deleted \\*)";

/// Receives commands in the AST defined in the `syntax` module, and emits
/// responses in that same model.
///
/// Besides translating to `MailStore` operations, it tracks the connection
/// state (whether the client has logged in and what it has selected) and
/// relays notifications between sessions.
pub struct CommandProcessor {
    pub(super) log_prefix: LogPrefix,
    pub(super) config: Arc<SystemConfig>,
    pub(super) store: Arc<MailStore>,
    pub(super) registry: Arc<NotificationRegistry>,
    pub(super) session: SessionId,
    pub(super) outbox: Arc<Outbox>,
    pub(super) commands: CommandTable,

    pub(super) state: ConnectionState,
    pub(super) selected: Option<Selected>,
}

pub(super) struct Selected {
    pub(super) mailbox: Mailbox,
    pub(super) read_only: bool,
}

/// Used just for the convenient `?` operator. We mostly don't distinguish `Ok`
/// from `Err`; the contained value is sent down the wire either way.
pub(super) type CmdResult = Result<s::Response, s::Response>;

/// Return value from an operation that can either succeed with a value, or
/// fail with an IMAP response.
pub(super) type PartialResult<T> = Result<T, s::Response>;

/// Callback for untagged responses produced while a command runs.
pub(super) type SendResponse<'a> = &'a mut dyn FnMut(s::Response);

impl CommandProcessor {
    pub fn new(
        log_prefix: LogPrefix,
        config: Arc<SystemConfig>,
        store: Arc<MailStore>,
        registry: Arc<NotificationRegistry>,
        session: SessionId,
    ) -> Self {
        let outbox = Arc::new(Outbox::new());
        registry.register(session, Arc::clone(&outbox));

        CommandProcessor {
            log_prefix,
            config,
            store,
            registry,
            session,
            outbox,
            commands: CommandTable::standard(),

            state: ConnectionState::NotAuthenticated,
            selected: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn logged_out(&self) -> bool {
        ConnectionState::Logout == self.state
    }

    pub fn log_prefix(&self) -> &LogPrefix {
        &self.log_prefix
    }

    /// The outbox other sessions deliver notifications to.
    pub fn outbox(&self) -> Arc<Outbox> {
        Arc::clone(&self.outbox)
    }

    pub fn selected_mailbox(&self) -> Option<&str> {
        self.selected.as_ref().map(|s| s.mailbox.name.as_str())
    }

    /// Parses one complete command line in the current state.
    pub fn parse(&self, line: &[u8]) -> Result<s::CommandLine, s::ParseError> {
        let (mailbox_query, last_uid) = match self.selected {
            None => (SearchQuery::Null, 0),
            Some(ref selected) => (
                selected.mailbox.kind.query(),
                self.store
                    .sequence(&selected.mailbox)
                    .ok()
                    .and_then(|seq| seq.last().copied())
                    .unwrap_or(0),
            ),
        };

        parser::parse_command_line(
            line,
            &ParseContext {
                state: self.state,
                commands: &self.commands,
                mailbox_query,
                last_uid,
            },
        )
    }

    /// Takes the notifications queued for this session as untagged
    /// responses.
    ///
    /// If `defer_expunge` is set, `EXPUNGE` notifications stay queued, since
    /// they may not be sent while the client is relying on sequence numbers
    /// staying put.
    pub fn take_notifications(&self, defer_expunge: bool) -> Vec<s::Response> {
        let current = self.selected_mailbox();
        let lines = if defer_expunge {
            self.outbox
                .take_except(current, |line| line.ends_with(" EXPUNGE"))
        } else {
            self.outbox.take(current)
        };

        lines.into_iter().map(s::Response::data).collect()
    }

    /// Queues `line` for every other session with `mailbox` selected.
    pub(super) fn publish_to_others(&self, mailbox: &str, line: String) {
        self.registry.publish(mailbox, line, Some(self.session));
    }

    /// Queues `line` for every session with `mailbox` selected, including
    /// this one.
    pub(super) fn publish(&self, mailbox: &str, line: String) {
        self.registry.publish(mailbox, line, None);
    }

    pub(super) fn deselect(&mut self) {
        if self.selected.take().is_some() {
            self.registry.set_mailbox(self.session, None);
        }
        if ConnectionState::Selected == self.state {
            self.state = ConnectionState::Authenticated;
        }
    }
}

impl Drop for CommandProcessor {
    fn drop(&mut self) {
        self.registry.unregister(self.session);
        self.store.logout_session(self.session);
    }
}

/// A plain `OK`; the quip is filled in from the command name.
pub(super) fn success() -> CmdResult {
    Ok(s::Response::cond(s::RespCondType::Ok, None, ""))
}

/// An `OK` with the given response code.
pub(super) fn success_with(code: &'static str) -> CmdResult {
    Ok(s::Response::cond(
        s::RespCondType::Ok,
        Some(Cow::Borrowed(code)),
        "",
    ))
}

pub(super) fn no(quip: impl Into<Cow<'static, str>>) -> s::Response {
    s::Response::cond(s::RespCondType::No, None, quip)
}

pub(super) fn bad(quip: impl Into<Cow<'static, str>>) -> s::Response {
    s::Response::cond(s::RespCondType::Bad, None, quip)
}

pub(super) fn catch_all_error_handling(
    log_prefix: &LogPrefix,
    name: &str,
    e: Error,
) -> s::Response {
    warn!("{} {} failed: {}", log_prefix, name, e);
    no(format!("{} failed - {}", name, e))
}
