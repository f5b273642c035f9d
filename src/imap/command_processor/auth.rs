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

use log::{info, warn};

use super::defs::*;
use crate::imap::parser::ConnectionState;
use crate::support::error::Error;

impl CommandProcessor {
    /// Called when a line initiating an `AUTHENTICATE` is received.
    ///
    /// If this returns `Some`, that response is sent to the client and the
    /// server returns to the normal command loop. If it returns `None`, the
    /// server sends an empty continuation line and feeds the client's next
    /// line to `authenticate_finish`.
    pub fn authenticate_start(
        &mut self,
        tag: Option<String>,
        mechanism: &str,
    ) -> Option<s::ResponseLine> {
        if "PLAIN".eq_ignore_ascii_case(mechanism) {
            return None;
        }

        let e = Error::UnsupportedMechanism(mechanism.to_owned());
        info!("{} {}", self.log_prefix, e);
        Some(s::ResponseLine {
            tag,
            response: no(format!("AUTHENTICATE failed - {}", e)),
        })
    }

    pub fn authenticate_finish(
        &mut self,
        tag: Option<String>,
        data: &[u8],
    ) -> s::ResponseLine {
        let response = self
            .authenticate_plain(data)
            .unwrap_or_else(|response| response);
        s::ResponseLine {
            tag,
            response: match response {
                s::Response::Cond(mut cr) => {
                    if cr.quip.is_empty() {
                        cr.quip = Cow::Borrowed("AUTHENTICATE completed");
                    }
                    s::Response::Cond(cr)
                },
                response => response,
            },
        }
    }

    fn authenticate_plain(&mut self, data: &[u8]) -> CmdResult {
        if b"*" == data {
            return Err(bad("AUTHENTICATE cancelled"));
        }

        let string = base64::decode(data)
            .ok()
            .and_then(|decoded| String::from_utf8(decoded).ok())
            .ok_or_else(|| bad("AUTHENTICATE failed - bad base64 or UTF-8"))?;

        // RFC 4616: [authorise-id] NUL authenticate-id NUL password
        let mut parts = string.split('\x00');
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(authorise), Some(authenticate), Some(password), None)
                if authorise.is_empty() || authorise == authenticate =>
            {
                self.log_in(authenticate, password)
                    .map_err(|_| no("AUTHENTICATE failed"))
            },
            _ => Err(no("AUTHENTICATE failed")),
        }
    }

    pub(super) fn cmd_log_in(
        &mut self,
        userid: String,
        password: String,
    ) -> CmdResult {
        self.log_in(&userid, &password)
    }

    fn log_in(&mut self, userid: &str, password: &str) -> CmdResult {
        let auth = &self.config.auth;
        if userid != auth.user || password != auth.password {
            warn!("{} Rejected login for {:?}", self.log_prefix, userid);
            return Err(no("LOGIN failed"));
        }

        self.log_prefix.set_user(userid.to_owned());
        self.state = ConnectionState::Authenticated;
        info!("{} Logged in", self.log_prefix);
        success()
    }
}
