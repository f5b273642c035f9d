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

//! The mailbox view of the backend.
//!
//! `MailStore` turns IMAP mailbox names into backend queries and IMAP flags
//! into labels and state. It also remembers mailboxes created with `CREATE`
//! until a message lands in them, since the backend has no notion of an empty
//! label.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::prelude::*;
use log::info;

use super::cache::{MailboxCache, Metric, Validity};
use super::lock;
use super::message::MessageHandle;
use super::model::*;
use super::special::*;
use crate::backend::{
    MessageId, MessageInfo, MessageParser, MetaIndex, ParsedMessage,
    RawStore, SearchQuery,
};
use crate::imap::syntax::{SeqItem, SeqNumber, SequenceSet, StoreMode};
use crate::support::error::Error;

/// Number of mutexes flag updates are spread over.
const FLAG_LOCK_STRIPES: usize = 64;

pub struct MailStore {
    index: Arc<dyn MetaIndex>,
    raw: Arc<dyn RawStore>,
    parser: Arc<dyn MessageParser>,
    special: SpecialMailboxes,
    pending: Mutex<Vec<PendingMailbox>>,
    cache: MailboxCache,
    flag_locks: Vec<Mutex<()>>,
    /// Held from the safe id lookup of an append until the new message is
    /// in the index.
    append_lock: Mutex<()>,
}

impl MailStore {
    pub fn new(
        index: Arc<dyn MetaIndex>,
        raw: Arc<dyn RawStore>,
        parser: Arc<dyn MessageParser>,
    ) -> Self {
        MailStore {
            index,
            raw,
            parser,
            special: SpecialMailboxes::standard(),
            pending: Mutex::new(Vec::new()),
            cache: MailboxCache::new(),
            flag_locks: (0..FLAG_LOCK_STRIPES)
                .map(|_| Mutex::new(()))
                .collect(),
            append_lock: Mutex::new(()),
        }
    }

    pub fn special(&self) -> &SpecialMailboxes {
        &self.special
    }

    /// Determines what `name` refers to, without checking that it exists.
    pub fn resolve(&self, name: &str) -> Result<MailboxKind, Error> {
        if ALL_MAIL == name {
            return Ok(MailboxKind::AllMail);
        }

        if name.starts_with(QUERIES_PREFIX) {
            let text = &name[QUERIES_PREFIX.len()..];
            return if text.trim().is_empty() {
                Err(Error::InvalidQuery("invalid query".to_owned()))
            } else {
                Ok(MailboxKind::Query(text.to_owned()))
            };
        }

        let key = if let Some(key) = self.special.backend_key(name) {
            key
        } else if name.len() > 1 && name.starts_with('~') {
            &name[1..]
        } else {
            return Err(Error::NoMailbox(format!(
                "{} doesn't exist or is invalid",
                name
            )));
        };

        if is_state(key) {
            Ok(MailboxKind::State(key.to_owned()))
        } else {
            Ok(MailboxKind::Label(key.to_owned()))
        }
    }

    /// Returns the kind and attributes of `name` if it exists.
    fn lookup(
        &self,
        name: &str,
    ) -> Result<Option<(MailboxKind, Vec<MailboxAttribute>)>, Error> {
        let kind = match self.resolve(name) {
            Ok(kind) => kind,
            Err(Error::NoMailbox(_)) => return Ok(None),
            Err(e) => return Err(e),
        };

        if let MailboxKind::Label(ref key) = kind {
            let always = self
                .special
                .imap_name(key)
                .map_or(false, |n| "INBOX" == n);
            if !always && !self.index.all_labels()?.contains(key) {
                return Ok(lock(&self.pending)
                    .iter()
                    .find(|p| p.name == name)
                    .map(|p| (kind.clone(), p.attributes.clone())));
            }
        }

        Ok(Some((kind, vec![])))
    }

    /// All listable mailboxes, sorted by name.
    ///
    /// State and query mailboxes can be selected but are never listed.
    pub fn list_mailboxes(&self) -> Result<Vec<MailboxInfo>, Error> {
        let mut names = BTreeMap::<String, Vec<MailboxAttribute>>::new();
        names.insert("INBOX".to_owned(), vec![]);
        names.insert(ALL_MAIL.to_owned(), vec![]);
        for label in self.index.all_labels()? {
            names.insert(self.special.mailbox_name(&label), vec![]);
        }
        for pending in lock(&self.pending).iter() {
            names
                .entry(pending.name.clone())
                .or_insert_with(|| pending.attributes.clone());
        }

        Ok(names
            .into_iter()
            .map(|(name, attributes)| MailboxInfo { name, attributes })
            .collect())
    }

    /// Records a new, empty mailbox owned by `owner`.
    ///
    /// The mailbox is forgotten when its owner logs out unless a message has
    /// been placed in it by then.
    pub fn create_mailbox(
        &self,
        name: &str,
        owner: SessionId,
    ) -> Result<(), Error> {
        let exists = match self.resolve(name)? {
            MailboxKind::Label(_) => self.lookup(name)?.is_some(),
            _ => true,
        };
        if exists {
            return Err(Error::MailboxExists(format!(
                "{} already exists",
                name
            )));
        }

        let attributes = if name.ends_with('/') {
            vec![MailboxAttribute::Noselect]
        } else {
            vec![]
        };
        lock(&self.pending).push(PendingMailbox {
            name: name.to_owned(),
            attributes,
            owner,
        });
        Ok(())
    }

    /// Removes the mailbox's label from every thread carrying it.
    pub fn delete_mailbox(&self, name: &str) -> Result<(), Error> {
        let kind = self.resolve(name)?;
        if self.special.is_special(name) {
            return Err(Error::SpecialMailbox(
                "Can't delete a special mailbox".to_owned(),
            ));
        }
        if self.lookup(name)?.is_none() {
            return Err(Error::NoMailbox(format!("{} doesn't exist", name)));
        }

        lock(&self.pending).retain(|p| p.name != name);
        if let MailboxKind::Label(ref key) = kind {
            self.relabel_threads(key, None)?;
        }
        self.cache.forget(name);
        Ok(())
    }

    pub fn rename_mailbox(
        &self,
        name: &str,
        new_name: &str,
    ) -> Result<(), Error> {
        let kind = self.resolve(name)?;
        let new_kind = self.resolve(new_name)?;
        if self.special.is_special(name) || self.special.is_special(new_name) {
            return Err(Error::SpecialMailbox(
                "Can't rename a special mailbox".to_owned(),
            ));
        }
        if self.lookup(name)?.is_none() {
            return Err(Error::NoMailbox(format!(
                "Can't rename {} to {} : {} doesn't exist",
                name, new_name, name
            )));
        }
        if self.lookup(new_name)?.is_some() {
            return Err(Error::MailboxExists(format!(
                "Can't rename {} to {} : {} already exists",
                name, new_name, new_name
            )));
        }

        for pending in lock(&self.pending).iter_mut() {
            if pending.name == name {
                pending.name = new_name.to_owned();
            }
        }
        if let (MailboxKind::Label(ref from), MailboxKind::Label(ref to)) =
            (kind, new_kind)
        {
            self.relabel_threads(from, Some(to))?;
        }
        self.cache.forget(name);
        self.cache.forget(new_name);
        Ok(())
    }

    /// Replaces `from` with `to` (or nothing) on every thread labelled
    /// `from`.
    fn relabel_threads(
        &self,
        from: &str,
        to: Option<&str>,
    ) -> Result<(), Error> {
        let mut done = BTreeSet::new();
        for info in self.index.query(&SearchQuery::flag(from))? {
            if !done.insert(info.thread_id) {
                continue;
            }

            let mut labels = info.labels;
            labels.remove(from);
            if let Some(to) = to {
                labels.insert(to.to_owned());
            }
            self.index.update_thread_labels(info.thread_id, labels)?;
        }

        self.index.prune_labels()
    }

    /// Looks `name` up for `SELECT` or `EXAMINE`.
    pub fn selectable_mailbox(&self, name: &str) -> Result<Mailbox, Error> {
        match self.lookup(name)? {
            None => Err(Error::NoMailbox(format!(
                "Can't select {} : this mailbox doesn't exist",
                name
            ))),
            Some((_, ref attributes))
                if attributes.contains(&MailboxAttribute::Noselect) =>
            {
                Err(Error::NotSelectable(format!(
                    "Can't select {} : not a selectable mailbox",
                    name
                )))
            },
            Some((kind, _)) => Ok(Mailbox {
                name: name.to_owned(),
                kind,
            }),
        }
    }

    pub fn mailbox_status(&self, name: &str) -> Result<MailboxStatus, Error> {
        let kind = match self.lookup(name)? {
            Some((kind, _)) => kind,
            None => {
                return Err(Error::NoMailbox(format!(
                    "{} doesn't exist or is invalid",
                    name
                )))
            },
        };
        let mailbox = Mailbox {
            name: name.to_owned(),
            kind,
        };

        Ok(MailboxStatus {
            messages: self.count_messages(&mailbox)?,
            recent: 0,
            uid_next: self.index.size()? + 1,
            uid_validity: 1,
            unseen: self.count_unseen(&mailbox)?,
        })
    }

    fn validity(&self, kind: &MailboxKind) -> Result<Validity, Error> {
        Ok(match kind.stamp_key() {
            Some(key) => Validity {
                modified: self.index.timestamp(key)?,
                size: 0,
            },
            None => Validity {
                modified: 0,
                size: self.index.size()?,
            },
        })
    }

    /// The ids of every message in `mailbox`, ascending.
    ///
    /// Seqnum `n` is the message at index `n - 1`.
    pub fn sequence(
        &self,
        mailbox: &Mailbox,
    ) -> Result<Arc<Vec<MessageId>>, Error> {
        let validity = self.validity(&mailbox.kind)?;
        self.cache.sequence(&mailbox.name, validity, || {
            let mut ids = self
                .index
                .query(&mailbox.kind.query())?
                .into_iter()
                .map(|info| info.id)
                .collect::<Vec<_>>();
            ids.sort_unstable();
            ids.dedup();
            Ok(ids)
        })
    }

    pub fn count_messages(&self, mailbox: &Mailbox) -> Result<u64, Error> {
        let validity = self.validity(&mailbox.kind)?;
        self.cache
            .count(&mailbox.name, Metric::Messages, validity, || {
                match mailbox.kind {
                    MailboxKind::AllMail => self.index.size(),
                    ref kind => {
                        Ok(self.index.query(&kind.query())?.len() as u64)
                    },
                }
            })
    }

    pub fn count_unseen(&self, mailbox: &Mailbox) -> Result<u64, Error> {
        let mut validity = self.validity(&mailbox.kind)?;
        if mailbox.kind.stamp_key().is_none() {
            validity.modified = self.index.timestamp(UNREAD)?;
        }

        self.cache.count(&mailbox.name, Metric::Unseen, validity, || {
            let query = mailbox.kind.query() & SearchQuery::flag(UNREAD);
            Ok(self.index.query(&query)?.len() as u64)
        })
    }

    /// Resolves `set` against the current contents of `mailbox`.
    ///
    /// In sequence number mode every number must refer to a message. In UID
    /// mode, UIDs which match nothing are silently skipped. The result is
    /// ascending and free of duplicates.
    pub fn resolve_sequence_set(
        &self,
        mailbox: &Mailbox,
        set: &SequenceSet,
        uid: bool,
    ) -> Result<Vec<MessageRef>, Error> {
        let seq = self.sequence(mailbox)?;
        let last = if uid {
            seq.last().copied().unwrap_or(0)
        } else {
            seq.len() as u64
        };
        let value = |n: SeqNumber| match n {
            SeqNumber::Number(n) => n,
            SeqNumber::Last => last,
        };

        let mut indices = BTreeSet::new();
        for &item in &set.0 {
            let (a, b) = match item {
                SeqItem::Single(n) => (value(n), value(n)),
                SeqItem::Range(a, b) => (value(a), value(b)),
            };
            let (lo, hi) = (a.min(b), a.max(b));

            if uid {
                indices.extend(
                    seq.iter()
                        .enumerate()
                        .filter(|&(_, &id)| id >= lo && id <= hi)
                        .map(|(ix, _)| ix),
                );
            } else {
                if 0 == lo || hi > last {
                    return Err(Error::SequenceOutOfRange);
                }
                indices.extend((lo - 1) as usize..hi as usize);
            }
        }

        Ok(indices
            .into_iter()
            .map(|ix| MessageRef {
                id: seq[ix],
                seqnum: Seqnum::from_index(ix),
            })
            .collect())
    }

    /// Runs `query` within `mailbox`.
    pub fn search(
        &self,
        mailbox: &Mailbox,
        query: &SearchQuery,
    ) -> Result<Vec<MessageRef>, Error> {
        let seq = self.sequence(mailbox)?;
        let hits = self
            .index
            .query(&(mailbox.kind.query() & query.clone()))?;
        Ok(hits
            .into_iter()
            .filter_map(|info| {
                seq.binary_search(&info.id).ok().map(|ix| MessageRef {
                    id: info.id,
                    seqnum: Seqnum::from_index(ix),
                })
            })
            .collect())
    }

    pub fn handle(&self, message: MessageRef) -> MessageHandle<'_> {
        MessageHandle::new(self, message)
    }

    pub(super) fn load(&self, id: MessageId) -> Result<MessageInfo, Error> {
        self.index
            .load_message_info(id)?
            .ok_or(Error::NxMessage(id))
    }

    pub(super) fn read_raw(
        &self,
        info: &MessageInfo,
    ) -> Result<Vec<u8>, Error> {
        self.raw.read(info.location)
    }

    pub(super) fn parse(&self, data: &[u8]) -> Result<ParsedMessage, Error> {
        self.parser.parse(data)
    }

    pub fn flags_of(&self, info: &MessageInfo) -> Vec<String> {
        self.special.to_imap(&info.labels, &info.state)
    }

    fn flag_lock(&self, id: MessageId) -> MutexGuard<'_, ()> {
        lock(&self.flag_locks[id as usize % self.flag_locks.len()])
    }

    /// Applies a `STORE` to one message, returning its flags afterwards.
    pub fn store_flags(
        &self,
        id: MessageId,
        mode: StoreMode,
        flags: &[String],
    ) -> Result<Vec<String>, Error> {
        let _guard = self.flag_lock(id);
        let info = self.load(id)?;

        let new_flags: Vec<String> = match mode {
            StoreMode::Set => info
                .labels
                .iter()
                .map(|label| self.special.mailbox_name(label))
                .chain(flags.iter().cloned())
                .collect(),
            StoreMode::Add => self
                .flags_of(&info)
                .into_iter()
                .chain(flags.iter().cloned())
                .collect(),
            StoreMode::Remove => self
                .flags_of(&info)
                .into_iter()
                .filter(|have| !flags.iter().any(|f| same_flag(have, f)))
                .collect(),
        };

        let mut backend = self.special.to_backend(&new_flags);
        backend.state.extend(
            info.state
                .iter()
                .filter(|s| IMMUTABLE_STATE.contains(&s.as_str()))
                .cloned(),
        );

        if backend.labels != info.labels {
            self.index
                .update_thread_labels(info.thread_id, backend.labels)?;
        }
        if backend.state != info.state {
            self.index.update_message_state(id, backend.state)?;
        }

        Ok(self.flags_of(&self.load(id)?))
    }

    /// Checks that messages can be added to the mailbox called `name`.
    pub fn append_target(&self, name: &str) -> Result<MailboxKind, Error> {
        match self.lookup(name)? {
            None => Err(Error::NxMailbox(name.to_owned())),
            Some((_, ref attributes))
                if attributes.contains(&MailboxAttribute::Noselect) =>
            {
                Err(Error::NotSelectable(format!(
                    "{} is not selectable",
                    name
                )))
            },
            Some((kind, _)) => Ok(kind),
        }
    }

    /// Adds a message to the mailbox called `name`.
    ///
    /// If the index already has the message, the mailbox's label and `flags`
    /// are merged onto it instead.
    pub fn append_mail(
        &self,
        data: &[u8],
        name: &str,
        flags: &[String],
        internal_date: Option<i64>,
    ) -> Result<MessageId, Error> {
        let kind = self.append_target(name)?;
        let parsed = self.parse(data)?;
        let mut backend = self.special.to_backend(flags);
        match kind {
            MailboxKind::Label(key) => {
                backend.labels.insert(key);
            },
            MailboxKind::State(key) => {
                backend.state.insert(key);
            },
            MailboxKind::AllMail | MailboxKind::Query(_) => (),
        }

        let _guard = lock(&self.append_lock);
        if let Some(id) = self.index.find_by_safe_id(&parsed.safe_id)? {
            let _flag_guard = self.flag_lock(id);
            let info = self.load(id)?;
            let mut labels = info.labels.clone();
            labels.extend(backend.labels);
            let mut state = info.state.clone();
            state.extend(backend.state);

            if labels != info.labels {
                self.index.update_thread_labels(info.thread_id, labels)?;
            }
            if state != info.state {
                self.index.update_message_state(id, state)?;
            }
            info!("Merged appended message into existing message {}", id);
            return Ok(id);
        }

        for &(present, key) in &[
            (parsed.has_attachment, "attachment"),
            (parsed.signed, "signed"),
            (parsed.encrypted, "encrypted"),
        ] {
            if present {
                backend.state.insert(key.to_owned());
            }
        }

        let location = self.raw.add(data)?;
        let (id, _) = self.index.add_message(
            &parsed,
            backend.state,
            backend.labels,
            location,
            internal_date.unwrap_or_else(|| Utc::now().timestamp()),
        )?;
        if let Some(ref from) = parsed.from {
            self.index.touch_contact(from)?;
        }

        Ok(id)
    }

    /// Places a copy of message `id`, with its current flags, in `dst`.
    pub fn copy_message(
        &self,
        id: MessageId,
        dst: &str,
    ) -> Result<MessageId, Error> {
        let info = self.load(id)?;
        let data = self.read_raw(&info)?;
        self.append_mail(
            &data,
            dst,
            &self.flags_of(&info),
            Some(info.internal_date),
        )
    }

    /// Takes every `\Deleted` message out of `mailbox`.
    ///
    /// Labels belong to whole threads, so this can also take undeleted
    /// siblings out of a label mailbox. Returns the sequence numbers of
    /// every message that left the mailbox, highest first, so that they can
    /// be reported one by one without renumbering.
    ///
    /// Membership of `All Mail` and query mailboxes cannot be revoked, so
    /// expunging them does nothing.
    pub fn expunge(&self, mailbox: &Mailbox) -> Result<Vec<Seqnum>, Error> {
        let seq = match mailbox.kind {
            MailboxKind::AllMail | MailboxKind::Query(_) => return Ok(vec![]),
            _ => self.sequence(mailbox)?,
        };

        let deleted = self
            .index
            .query(&(mailbox.kind.query() & SearchQuery::flag(DELETED)))?;
        if deleted.is_empty() {
            return Ok(vec![]);
        }

        for found in deleted {
            let _guard = self.flag_lock(found.id);
            let info = self.load(found.id)?;
            let mut state = info.state.clone();
            state.remove(DELETED);

            match mailbox.kind {
                MailboxKind::Label(ref key) => {
                    let mut labels = info.labels.clone();
                    labels.remove(key);
                    self.index.update_thread_labels(info.thread_id, labels)?;
                },
                MailboxKind::State(ref key) => {
                    state.remove(key);
                },
                MailboxKind::AllMail | MailboxKind::Query(_) => (),
            }
            self.index.update_message_state(info.id, state)?;
        }

        self.index.prune_labels()?;
        let remaining = self
            .index
            .query(&mailbox.kind.query())?
            .into_iter()
            .map(|info| info.id)
            .collect::<BTreeSet<_>>();
        Ok(seq
            .iter()
            .enumerate()
            .rev()
            .filter(|&(_, id)| !remaining.contains(id))
            .map(|(ix, _)| Seqnum::from_index(ix))
            .collect())
    }

    /// Forgets the still-empty mailboxes `session` created.
    pub fn logout_session(&self, session: SessionId) {
        lock(&self.pending).retain(|p| p.owner != session);
    }
}

/// Whether two flags name the same thing, ignoring case and the `~` label
/// prefix.
fn same_flag(a: &str, b: &str) -> bool {
    a.trim_start_matches('~')
        .eq_ignore_ascii_case(b.trim_start_matches('~'))
}
