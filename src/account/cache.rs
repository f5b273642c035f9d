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

//! Lazily revalidated caches of per-mailbox data.
//!
//! Each entry remembers the backend's view of the mailbox at the moment the
//! value was computed. On lookup the current view is fetched (which is cheap)
//! and the value is recomputed only if the backend has moved on since.
//!
//! Nothing here is linearisable: two lookups may race, both recompute, and
//! the later insert wins. Either value was correct when computed.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex};

use super::lock;
use crate::backend::MessageId;
use crate::support::error::Error;

/// The backend's view of a mailbox which decides whether a cached value is
/// stale.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Validity {
    /// The modification stamp of the mailbox's backing key, or 0 if it has
    /// none.
    pub modified: u64,
    /// The index size, for mailboxes whose content can only change by
    /// messages being added; otherwise 0.
    pub size: u64,
}

#[derive(Clone, Debug)]
pub struct CacheEntry<T> {
    pub value: T,
    pub last_validated: Validity,
}

impl<T> CacheEntry<T> {
    pub fn new(value: T, last_validated: Validity) -> Self {
        CacheEntry {
            value,
            last_validated,
        }
    }

    pub fn is_dirty(&self, current: Validity) -> bool {
        current.modified > self.last_validated.modified
            || current.size > self.last_validated.size
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Metric {
    Messages,
    Unseen,
}

#[derive(Default)]
pub struct MailboxCache {
    sequences: Mutex<HashMap<String, CacheEntry<Arc<Vec<MessageId>>>>>,
    counts: Mutex<HashMap<(String, Metric), CacheEntry<u64>>>,
}

impl MailboxCache {
    pub fn new() -> Self {
        MailboxCache::default()
    }

    /// The ascending message ids of `mailbox`.
    pub fn sequence(
        &self,
        mailbox: &str,
        current: Validity,
        compute: impl FnOnce() -> Result<Vec<MessageId>, Error>,
    ) -> Result<Arc<Vec<MessageId>>, Error> {
        lookup(&self.sequences, mailbox.to_owned(), current, || {
            compute().map(Arc::new)
        })
    }

    pub fn count(
        &self,
        mailbox: &str,
        metric: Metric,
        current: Validity,
        compute: impl FnOnce() -> Result<u64, Error>,
    ) -> Result<u64, Error> {
        lookup(&self.counts, (mailbox.to_owned(), metric), current, compute)
    }

    /// Drops everything cached for `mailbox`.
    pub fn forget(&self, mailbox: &str) {
        lock(&self.sequences).remove(mailbox);
        lock(&self.counts).retain(|&(ref name, _), _| name != mailbox);
    }
}

fn lookup<K: Eq + Hash, T: Clone>(
    map: &Mutex<HashMap<K, CacheEntry<T>>>,
    key: K,
    current: Validity,
    compute: impl FnOnce() -> Result<T, Error>,
) -> Result<T, Error> {
    if let Some(entry) = lock(map).get(&key) {
        if !entry.is_dirty(current) {
            return Ok(entry.value.clone());
        }
    }

    let value = compute()?;
    lock(map).insert(key, CacheEntry::new(value.clone(), current));
    Ok(value)
}
