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

//! Delivery of untagged updates between sessions.
//!
//! Each session owns an `Outbox` and registers it here along with the
//! mailbox it has selected. A session that changes a mailbox publishes the
//! untagged lines other sessions should see; they are queued in the outbox
//! of every session with that mailbox selected and written out the next
//! time that session flushes, i.e. at the end of a command or periodically
//! while idling.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use log::debug;
use tokio::sync::Notify;

use super::lock;
use super::model::SessionId;

/// Untagged lines waiting to be sent to one session.
#[derive(Default)]
pub struct Outbox {
    /// Pending lines, keyed by the mailbox they concern. `None` holds lines
    /// which are not about any particular mailbox.
    queues: Mutex<HashMap<Option<String>, Vec<String>>>,
    notify: Notify,
}

impl Outbox {
    pub fn new() -> Self {
        Outbox::default()
    }

    pub fn push(&self, mailbox: Option<&str>, line: String) {
        lock(&self.queues)
            .entry(mailbox.map(str::to_owned))
            .or_default()
            .push(line);
        self.notify.notify_one();
    }

    /// Removes and returns, oldest first, everything queued for `current`
    /// and everything not tied to a mailbox.
    ///
    /// Lines for any other mailbox are discarded, since they concern a
    /// mailbox this session has since left.
    pub fn take(&self, current: Option<&str>) -> Vec<String> {
        self.take_except(current, |_| false)
    }

    /// Like `take`, but lines for which `defer` returns true stay queued
    /// under `current` for a later call.
    pub fn take_except(
        &self,
        current: Option<&str>,
        defer: impl Fn(&str) -> bool,
    ) -> Vec<String> {
        let mut queues = lock(&self.queues);
        let mut lines = queues.remove(&None).unwrap_or_default();
        if let Some(current) = current {
            if let Some(more) = queues.remove(&Some(current.to_owned())) {
                lines.extend(more);
            }
        }
        queues.clear();

        let (deferred, lines): (Vec<_>, Vec<_>) =
            lines.into_iter().partition(|line| defer(line));
        if !deferred.is_empty() {
            queues.insert(current.map(str::to_owned), deferred);
        }
        lines
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.queues).values().all(Vec::is_empty)
    }

    /// Resolves when something has been pushed since the last time this
    /// resolved.
    pub async fn changed(&self) {
        self.notify.notified().await
    }
}

struct Subscription {
    mailbox: Option<String>,
    outbox: Arc<Outbox>,
}

/// The registry of live sessions and what they have selected.
#[derive(Default)]
pub struct NotificationRegistry {
    sessions: Mutex<HashMap<SessionId, Subscription>>,
}

impl NotificationRegistry {
    pub fn new() -> Self {
        NotificationRegistry::default()
    }

    pub fn register(&self, session: SessionId, outbox: Arc<Outbox>) {
        lock(&self.sessions).insert(
            session,
            Subscription {
                mailbox: None,
                outbox,
            },
        );
    }

    pub fn unregister(&self, session: SessionId) {
        lock(&self.sessions).remove(&session);
    }

    pub fn set_mailbox(&self, session: SessionId, mailbox: Option<&str>) {
        if let Some(sub) = lock(&self.sessions).get_mut(&session) {
            sub.mailbox = mailbox.map(str::to_owned);
        }
    }

    /// Queues `line` for every session with `mailbox` selected, other than
    /// `exclude`.
    pub fn publish(
        &self,
        mailbox: &str,
        line: String,
        exclude: Option<SessionId>,
    ) {
        let sessions = lock(&self.sessions);
        let mut delivered = 0;
        for (&id, sub) in sessions.iter() {
            if Some(id) == exclude || sub.mailbox.as_deref() != Some(mailbox)
            {
                continue;
            }

            sub.outbox.push(Some(mailbox), line.clone());
            delivered += 1;
        }

        debug!(
            "Published {:?} to {} session(s) on {}",
            line, delivered, mailbox
        );
    }

    pub fn len(&self) -> usize {
        lock(&self.sessions).len()
    }
}
