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

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// The system-wide configuration for Labelmap.
///
/// This is stored in a file named `labelmap.toml` under the Labelmap system
/// root, which is typically `/usr/local/etc/labelmap` or `/etc/labelmap`.
#[derive(Clone, Debug, Deserialize, Serialize, Default)]
pub struct SystemConfig {
    /// Options for the IMAP listener and session lifetimes.
    ///
    /// The defaults are reasonable for most installations.
    #[serde(default)]
    pub imap: ImapConfig,

    /// The one credential pair accepted by LOGIN and AUTHENTICATE.
    pub auth: AuthConfig,

    /// How the server identifies itself to clients.
    #[serde(default)]
    pub identity: IdentityConfig,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ImapConfig {
    /// The address to listen on.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// The TCP port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// The maximum number of sessions which may be live at once.
    ///
    /// Connections beyond this limit are sent a `BYE` and closed
    /// immediately.
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
    /// How long a client which has not logged in may stay silent before it
    /// is disconnected.
    #[serde(default = "default_non_authenticated_timeout_secs")]
    pub non_authenticated_timeout_secs: u64,
    /// How long a logged-in client may stay silent before it is
    /// disconnected. This also bounds a single IDLE command.
    #[serde(default = "default_authenticated_timeout_secs")]
    pub authenticated_timeout_secs: u64,
    /// How often queued notifications are pushed to an idling client.
    #[serde(default = "default_idle_flush_interval_millis")]
    pub idle_flush_interval_millis: u64,
}

impl Default for ImapConfig {
    fn default() -> Self {
        ImapConfig {
            bind: default_bind(),
            port: default_port(),
            max_sessions: default_max_sessions(),
            non_authenticated_timeout_secs:
                default_non_authenticated_timeout_secs(),
            authenticated_timeout_secs: default_authenticated_timeout_secs(),
            idle_flush_interval_millis: default_idle_flush_interval_millis(),
        }
    }
}

impl ImapConfig {
    pub fn non_authenticated_timeout(&self) -> Duration {
        Duration::from_secs(self.non_authenticated_timeout_secs)
    }

    pub fn authenticated_timeout(&self) -> Duration {
        Duration::from_secs(self.authenticated_timeout_secs)
    }

    pub fn idle_flush_interval(&self) -> Duration {
        Duration::from_millis(self.idle_flush_interval_millis.max(1))
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct AuthConfig {
    pub user: String,
    pub password: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct IdentityConfig {
    /// The name announced in the greeting, followed by the version.
    #[serde(default = "default_name")]
    pub name: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        IdentityConfig {
            name: default_name(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1".to_owned()
}

fn default_port() -> u16 {
    1143
}

fn default_max_sessions() -> usize {
    64
}

fn default_non_authenticated_timeout_secs() -> u64 {
    10
}

fn default_authenticated_timeout_secs() -> u64 {
    30 * 60
}

fn default_idle_flush_interval_millis() -> u64 {
    1000
}

fn default_name() -> String {
    env!("CARGO_PKG_NAME").to_owned()
}
