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

//! In-process implementations of the backend services.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};

use chrono::prelude::*;

use super::query::QueryTarget;
use super::*;
use crate::support::error::Error;

/// Formats UNIX seconds the way date properties are compared.
pub fn iso8601(secs: i64) -> String {
    Utc.timestamp_opt(secs, 0)
        .single()
        .map(|d| d.format("%Y-%m-%dT%H:%M:%S").to_string())
        .unwrap_or_else(|| "1970-01-01T00:00:00".to_owned())
}

#[derive(Default)]
pub struct MemoryIndex {
    inner: Mutex<IndexInner>,
}

#[derive(Default)]
struct IndexInner {
    messages: BTreeMap<MessageId, StoredMessage>,
    threads: HashMap<ThreadId, BTreeSet<String>>,
    by_safe_id: HashMap<String, MessageId>,
    by_message_id: HashMap<String, ThreadId>,
    labels: BTreeSet<String>,
    contacts: HashMap<String, u64>,
    stamps: HashMap<String, u64>,
    clock: u64,
    next_message: MessageId,
    next_thread: ThreadId,
}

struct StoredMessage {
    thread_id: ThreadId,
    state: BTreeSet<String>,
    date: i64,
    internal_date: i64,
    size: u64,
    location: Location,
    parsed: ParsedMessage,
}

/// One message as seen by a `SearchQuery`.
struct Candidate<'a> {
    id: MessageId,
    message: &'a StoredMessage,
    labels: &'a BTreeSet<String>,
}

impl QueryTarget for Candidate<'_> {
    fn has_flag(&self, name: &str) -> bool {
        self.labels.contains(name) || self.message.state.contains(name)
    }

    fn property(&self, field: &str) -> Option<PropertyValue> {
        let parsed = &self.message.parsed;
        let people = |people: &[Person]| {
            Some(PropertyValue::Text(
                people
                    .iter()
                    .map(|p| p.to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
            ))
        };

        match field {
            "uid" => Some(PropertyValue::Number(self.id)),
            "size" => Some(PropertyValue::Number(self.message.size)),
            "internal-date" => Some(PropertyValue::Text(iso8601(
                self.message.internal_date,
            ))),
            "date" => Some(PropertyValue::Text(iso8601(self.message.date))),
            "subject" => Some(PropertyValue::Text(parsed.subject.clone())),
            "from" => people(
                parsed
                    .from
                    .as_ref()
                    .map(std::slice::from_ref)
                    .unwrap_or(&[]),
            ),
            "to" => people(&parsed.to),
            "cc" => people(&parsed.cc),
            "bcc" => people(&parsed.bcc),
            "x-ml-name" => parsed.list_name.clone().map(PropertyValue::Text),
            "x-mail-count" => parsed.mail_count.map(PropertyValue::Number),
            _ => parsed
                .header(field)
                .map(|v| PropertyValue::Text(v.to_owned())),
        }
    }

    fn contains_text(&self, term: &str) -> bool {
        let term = term.to_lowercase();
        self.message.parsed.text.to_lowercase().contains(&term)
            || self
                .message
                .parsed
                .from
                .as_ref()
                .map_or(false, |p| p.to_string().to_lowercase().contains(&term))
    }
}

impl MemoryIndex {
    pub fn new() -> Self {
        MemoryIndex::default()
    }

    fn lock(&self) -> MutexGuard<'_, IndexInner> {
        match self.inner.lock() {
            Ok(inner) => inner,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// The number of times `touch_contact` has seen `email`.
    pub fn contact_count(&self, email: &str) -> u64 {
        self.lock().contacts.get(email).copied().unwrap_or(0)
    }
}

impl IndexInner {
    fn info(&self, id: MessageId, message: &StoredMessage) -> MessageInfo {
        MessageInfo {
            id,
            thread_id: message.thread_id,
            labels: self
                .threads
                .get(&message.thread_id)
                .cloned()
                .unwrap_or_default(),
            state: message.state.clone(),
            date: message.date,
            internal_date: message.internal_date,
            size: message.size,
            location: message.location,
        }
    }

    fn bump<'a>(&mut self, keys: impl IntoIterator<Item = &'a String>) {
        self.clock += 1;
        for key in keys {
            self.stamps.insert(key.clone(), self.clock);
        }
    }
}

impl MetaIndex for MemoryIndex {
    fn query(&self, query: &SearchQuery) -> Result<Vec<MessageInfo>, Error> {
        let inner = self.lock();
        let empty = BTreeSet::new();
        Ok(inner
            .messages
            .iter()
            .filter(|&(&id, message)| {
                query.matches(&Candidate {
                    id,
                    message,
                    labels: inner
                        .threads
                        .get(&message.thread_id)
                        .unwrap_or(&empty),
                })
            })
            .map(|(&id, message)| inner.info(id, message))
            .collect())
    }

    fn load_message_info(
        &self,
        id: MessageId,
    ) -> Result<Option<MessageInfo>, Error> {
        let inner = self.lock();
        Ok(inner.messages.get(&id).map(|m| inner.info(id, m)))
    }

    fn update_message_state(
        &self,
        id: MessageId,
        state: BTreeSet<String>,
    ) -> Result<(), Error> {
        let mut inner = self.lock();
        let (thread_id, old) = match inner.messages.get_mut(&id) {
            Some(m) => (m.thread_id, std::mem::replace(&mut m.state, state)),
            None => return Err(Error::NxMessage(id)),
        };

        let mut touched: BTreeSet<String> = old;
        if let Some(m) = inner.messages.get(&id) {
            touched.extend(m.state.iter().cloned());
        }
        if let Some(labels) = inner.threads.get(&thread_id) {
            touched.extend(labels.iter().cloned());
        }
        inner.bump(&touched);
        Ok(())
    }

    fn update_thread_labels(
        &self,
        thread: ThreadId,
        labels: BTreeSet<String>,
    ) -> Result<(), Error> {
        let mut inner = self.lock();
        let old = inner
            .threads
            .insert(thread, labels.clone())
            .unwrap_or_default();

        let mut touched: BTreeSet<String> = old;
        touched.extend(labels.iter().cloned());
        for m in inner.messages.values().filter(|m| thread == m.thread_id) {
            touched.extend(m.state.iter().cloned());
        }
        inner.labels.extend(labels);
        inner.bump(&touched);
        Ok(())
    }

    fn add_message(
        &self,
        message: &ParsedMessage,
        state: BTreeSet<String>,
        labels: BTreeSet<String>,
        location: Location,
        internal_date: i64,
    ) -> Result<(MessageId, ThreadId), Error> {
        let mut inner = self.lock();

        let existing_thread = message
            .refs
            .iter()
            .find_map(|r| inner.by_message_id.get(r).copied());
        let thread_id = match existing_thread {
            Some(t) => t,
            None => {
                inner.next_thread += 1;
                inner.next_thread
            },
        };

        inner.next_message += 1;
        let id = inner.next_message;

        let thread_labels = inner.threads.entry(thread_id).or_default();
        thread_labels.extend(labels);
        let thread_labels = thread_labels.clone();

        inner.by_safe_id.insert(message.safe_id.clone(), id);
        inner
            .by_message_id
            .insert(message.message_id.clone(), thread_id);
        inner.labels.extend(thread_labels.iter().cloned());

        let mut touched = thread_labels;
        touched.extend(state.iter().cloned());
        inner.messages.insert(
            id,
            StoredMessage {
                thread_id,
                state,
                date: message.date,
                internal_date,
                size: message.root.body.end as u64,
                location,
                parsed: message.clone(),
            },
        );
        inner.bump(&touched);

        Ok((id, thread_id))
    }

    fn find_by_safe_id(
        &self,
        safe_id: &str,
    ) -> Result<Option<MessageId>, Error> {
        Ok(self.lock().by_safe_id.get(safe_id).copied())
    }

    fn all_labels(&self) -> Result<BTreeSet<String>, Error> {
        Ok(self.lock().labels.clone())
    }

    fn size(&self) -> Result<u64, Error> {
        Ok(self.lock().messages.len() as u64)
    }

    fn timestamp(&self, label: &str) -> Result<u64, Error> {
        Ok(self.lock().stamps.get(label).copied().unwrap_or(0))
    }

    fn touch_contact(&self, person: &Person) -> Result<(), Error> {
        *self
            .lock()
            .contacts
            .entry(person.email.to_lowercase())
            .or_insert(0) += 1;
        Ok(())
    }

    fn prune_labels(&self) -> Result<(), Error> {
        let mut inner = self.lock();
        let live: BTreeSet<String> =
            inner.threads.values().flatten().cloned().collect();
        inner.labels.retain(|l| live.contains(l));
        Ok(())
    }
}

/// Keeps raw messages in memory. Locations are indices.
#[derive(Default)]
pub struct MemoryStore {
    messages: Mutex<Vec<Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }
}

impl RawStore for MemoryStore {
    fn add(&self, data: &[u8]) -> Result<Location, Error> {
        let mut messages = match self.messages.lock() {
            Ok(m) => m,
            Err(poisoned) => poisoned.into_inner(),
        };
        messages.push(data.to_vec());
        Ok(messages.len() as Location - 1)
    }

    fn read(&self, location: Location) -> Result<Vec<u8>, Error> {
        let messages = match self.messages.lock() {
            Ok(m) => m,
            Err(poisoned) => poisoned.into_inner(),
        };
        messages.get(location as usize).cloned().ok_or_else(|| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no message stored at {}", location),
            ))
        })
    }
}
