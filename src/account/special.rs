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

//! Translation between IMAP names and the backend's vocabulary.
//!
//! Mailboxes are labels, and flags are labels plus state. A handful of IMAP
//! names have a fixed backend counterpart; every other label `x` is seen by
//! IMAP clients as `~x`.
//!
//! `\Seen` has no counterpart. It is the absence of the `unread` state, and
//! `unread` itself is never shown.

use std::collections::BTreeSet;

use log::debug;

/// The name of the mailbox holding every message.
pub const ALL_MAIL: &str = "All Mail";
/// Names under this prefix are full-text searches.
pub const QUERIES_PREFIX: &str = "queries/";

pub const SEEN: &str = "\\Seen";
pub const UNREAD: &str = "unread";
pub const DELETED: &str = "deleted";

/// Keys which are per-message state rather than thread labels.
pub const MESSAGE_STATE: &[&str] = &[
    "starred",
    "deleted",
    "unread",
    "attachment",
    "signed",
    "encrypted",
    "draft",
];

/// State derived from message content, which flag updates never remove.
pub const IMMUTABLE_STATE: &[&str] =
    &["attachment", "signed", "encrypted", "draft"];

pub fn is_state(key: &str) -> bool {
    MESSAGE_STATE.contains(&key)
}

/// Backend flags, split the way the index stores them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BackendFlags {
    pub state: BTreeSet<String>,
    pub labels: BTreeSet<String>,
}

/// The table of IMAP names with fixed backend keys.
#[derive(Clone, Debug)]
pub struct SpecialMailboxes {
    entries: Vec<(&'static str, &'static str)>,
}

impl SpecialMailboxes {
    pub fn standard() -> Self {
        SpecialMailboxes {
            entries: vec![
                ("\\Starred", "starred"),
                ("\\Deleted", "deleted"),
                ("\\Draft", "draft"),
                ("Sent", "sent"),
                ("INBOX", "inbox"),
            ],
        }
    }

    pub fn backend_key(&self, imap_name: &str) -> Option<&'static str> {
        self.entries
            .iter()
            .find(|&&(name, _)| name.eq_ignore_ascii_case(imap_name))
            .map(|&(_, key)| key)
    }

    pub fn imap_name(&self, key: &str) -> Option<&'static str> {
        self.entries
            .iter()
            .find(|&&(_, k)| k == key)
            .map(|&(name, _)| name)
    }

    /// Whether `name` can be neither deleted nor renamed.
    pub fn is_special(&self, name: &str) -> bool {
        ALL_MAIL == name
            || name.starts_with(QUERIES_PREFIX)
            || self.backend_key(name).is_some()
            || is_state(name.trim_start_matches('~'))
    }

    /// The mailbox name for a backend label.
    pub fn mailbox_name(&self, label: &str) -> String {
        self.imap_name(label)
            .map(str::to_owned)
            .unwrap_or_else(|| format!("~{}", label))
    }

    /// Maps the labels and state of a message to IMAP flags, sorted.
    pub fn to_imap<'a>(
        &self,
        labels: impl IntoIterator<Item = &'a String>,
        state: &'a BTreeSet<String>,
    ) -> Vec<String> {
        let mut flags: BTreeSet<String> = labels
            .into_iter()
            .chain(state.iter())
            .filter(|key| UNREAD != key.as_str())
            .map(|key| self.mailbox_name(key))
            .collect();
        if !state.contains(UNREAD) {
            flags.insert(SEEN.to_owned());
        }
        flags.into_iter().collect()
    }

    /// Maps IMAP flags to backend state and labels.
    ///
    /// `unread` is present exactly when `\Seen` is not. System flags with no
    /// backend counterpart are dropped.
    pub fn to_backend<'a>(
        &self,
        flags: impl IntoIterator<Item = &'a String>,
    ) -> BackendFlags {
        let mut seen = false;
        let mut result = BackendFlags::default();

        for flag in flags {
            let key = if flag.eq_ignore_ascii_case(SEEN) {
                seen = true;
                continue;
            } else if let Some(key) = self.backend_key(flag) {
                key
            } else if flag.starts_with('\\') {
                debug!("Dropping unmappable flag {}", flag);
                continue;
            } else {
                flag.trim_start_matches('~')
            };

            if key.is_empty() || UNREAD == key {
                continue;
            }

            if is_state(key) {
                result.state.insert(key.to_owned());
            } else {
                result.labels.insert(key.to_owned());
            }
        }

        if !seen {
            result.state.insert(UNREAD.to_owned());
        }

        result
    }
}
