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
use std::ops::Range;
use std::time::UNIX_EPOCH;

use chrono::prelude::*;

use super::defs::*;
use super::flags::flag_list;
use crate::account::message::MessageHandle;
use crate::account::special::SEEN;
use crate::backend::{MimePart, ParsedMessage, Person};
use crate::imap::lex::LexWriter;
use crate::support::error::Error;

impl CommandProcessor {
    pub(super) fn cmd_fetch(
        &mut self,
        name: &str,
        set: s::SequenceSet,
        mut atts: Vec<s::FetchAtt>,
        uid: bool,
        sender: SendResponse<'_>,
    ) -> CmdResult {
        let selected = selected!(self)?;
        if uid && !atts.contains(&s::FetchAtt::Uid) {
            atts.insert(0, s::FetchAtt::Uid);
        }

        let messages = self
            .store
            .resolve_sequence_set(&selected.mailbox, &set, uid)
            .map_err(map_error! {
                self, name,
                SequenceOutOfRange => (Bad, None),
            })?;

        let marks_seen =
            !selected.read_only && atts.iter().any(implicitly_sets_seen);
        let fetches_flags = atts.contains(&s::FetchAtt::Flags);

        for message in messages {
            let mut handle = self.store.handle(message);
            let new_flags = if marks_seen {
                self.mark_seen(&selected.mailbox.name, &mut handle)
                    .map_err(map_error!(self, name))?
            } else {
                None
            };

            let mut line = Vec::new();
            write_fetch_response(
                &mut LexWriter::new(&mut line),
                &mut handle,
                &atts,
                new_flags.as_deref().filter(|_| !fetches_flags),
            )
            .map_err(map_error! {
                self, name,
                NxMessage => (No, None),
            })?;
            sender(s::Response::data(line));
        }

        success()
    }

    /// Adds `\Seen` to the message if it does not have it yet, returning
    /// the new flags if anything changed.
    fn mark_seen(
        &self,
        mailbox: &str,
        handle: &mut MessageHandle<'_>,
    ) -> Result<Option<Vec<String>>, Error> {
        if handle.flags()?.iter().any(|f| SEEN.eq_ignore_ascii_case(f)) {
            return Ok(None);
        }

        let flags = self.store.store_flags(
            handle.id(),
            s::StoreMode::Add,
            &[SEEN.to_owned()],
        )?;
        handle.invalidate();
        self.publish_to_others(
            mailbox,
            format!(
                "{} FETCH (FLAGS ({}))",
                handle.seqnum(),
                flag_list(&flags)
            ),
        );
        Ok(Some(flags))
    }
}

fn implicitly_sets_seen(att: &s::FetchAtt) -> bool {
    match *att {
        s::FetchAtt::Rfc822 | s::FetchAtt::Rfc822Text => true,
        s::FetchAtt::BodySection { peek, .. } => !peek,
        _ => false,
    }
}

/// Writes the `<seqnum> FETCH (...)` line for one message.
///
/// `extra_flags` are appended as a trailing `FLAGS` item; this is how a
/// client learns that the fetch set `\Seen` when it did not ask for flags.
fn write_fetch_response(
    w: &mut LexWriter<impl Write>,
    handle: &mut MessageHandle<'_>,
    atts: &[s::FetchAtt],
    extra_flags: Option<&[String]>,
) -> Result<(), Error> {
    w.num(u64::from(handle.seqnum().0.get()))?;
    w.verbatim(" FETCH (")?;
    for (ix, att) in atts.iter().enumerate() {
        if ix > 0 {
            w.verbatim(" ")?;
        }
        write_fetch_att(w, handle, att)?;
    }

    if let Some(flags) = extra_flags {
        if !atts.is_empty() {
            w.verbatim(" ")?;
        }
        w.verbatim("FLAGS (")?;
        w.verbatim(&flag_list(flags))?;
        w.verbatim(")")?;
    }

    w.verbatim(")")?;
    Ok(())
}

fn write_fetch_att(
    w: &mut LexWriter<impl Write>,
    handle: &mut MessageHandle<'_>,
    att: &s::FetchAtt,
) -> Result<(), Error> {
    match *att {
        s::FetchAtt::Envelope => {
            let (_, parsed) = handle.content()?;
            w.verbatim("ENVELOPE ")?;
            write_envelope(w, parsed)?;
        },
        s::FetchAtt::Flags => {
            let flags = handle.flags()?;
            w.verbatim("FLAGS (")?;
            w.verbatim(&flag_list(&flags))?;
            w.verbatim(")")?;
        },
        s::FetchAtt::InternalDate => {
            let date = internal_date(handle.info()?.internal_date);
            w.verbatim("INTERNALDATE ")?;
            w.datetime(&date)?;
        },
        s::FetchAtt::Rfc822 => {
            let (raw, _) = handle.content()?;
            w.verbatim("RFC822 ")?;
            w.literal(raw)?;
        },
        s::FetchAtt::Rfc822Header => {
            let (raw, parsed) = handle.content()?;
            w.verbatim("RFC822.HEADER ")?;
            w.literal(slice(raw, &parsed.root.header))?;
        },
        s::FetchAtt::Rfc822Size => {
            let size = handle.info()?.size;
            w.verbatim("RFC822.SIZE ")?;
            w.num(size)?;
        },
        s::FetchAtt::Rfc822Text => {
            let (raw, parsed) = handle.content()?;
            w.verbatim("RFC822.TEXT ")?;
            w.literal(slice(raw, &parsed.root.body))?;
        },
        s::FetchAtt::Body => {
            let (_, parsed) = handle.content()?;
            w.verbatim("BODY ")?;
            write_body(w, &parsed.root, false)?;
        },
        s::FetchAtt::BodyStructure => {
            let (_, parsed) = handle.content()?;
            w.verbatim("BODYSTRUCTURE ")?;
            write_body(w, &parsed.root, true)?;
        },
        s::FetchAtt::Uid => {
            w.verbatim("UID ")?;
            w.num(handle.id())?;
        },
        s::FetchAtt::BodySection {
            ref section,
            partial,
            ..
        } => {
            let (raw, parsed) = handle.content()?;
            let data = section_data(raw, parsed, section);
            w.verbatim(&format!("BODY[{}]", section))?;
            let data = match partial {
                None => &data[..],
                Some(partial) => {
                    w.verbatim(&format!("<{}>", partial.offset))?;
                    let len = data.len();
                    let start = (partial.offset as usize).min(len);
                    let end =
                        start.saturating_add(partial.size as usize).min(len);
                    &data[start..end]
                },
            };
            w.verbatim(" ")?;
            w.literal(data)?;
        },
    }

    Ok(())
}

fn internal_date(secs: i64) -> DateTime<FixedOffset> {
    let utc = Utc
        .timestamp_opt(secs, 0)
        .single()
        .unwrap_or_else(|| DateTime::<Utc>::from(UNIX_EPOCH));
    DateTime::<FixedOffset>::from(utc)
}

fn slice<'a>(raw: &'a [u8], range: &Range<usize>) -> &'a [u8] {
    raw.get(range.clone()).unwrap_or(&[])
}

/// Finds the MIME part at `path`, where part 1 of a non-multipart entity is
/// the entity itself.
fn find_part<'a>(root: &'a MimePart, path: &[u32]) -> Option<&'a MimePart> {
    let mut part = root;
    for &n in path {
        if part.is_multipart() {
            part = part.children.get((n as usize).checked_sub(1)?)?;
        } else if 1 != n {
            return None;
        }
    }

    Some(part)
}

/// Extracts the bytes a `BODY[section]` refers to.
///
/// Sections which name nothing yield an empty string.
fn section_data<'a>(
    raw: &'a [u8],
    parsed: &ParsedMessage,
    section: &s::Section,
) -> Cow<'a, [u8]> {
    let part = match find_part(&parsed.root, &section.part) {
        Some(part) => part,
        None => return Cow::Borrowed(&[]),
    };

    match section.text {
        None if section.part.is_empty() => Cow::Borrowed(raw),
        None | Some(s::SectionText::Text) => {
            Cow::Borrowed(slice(raw, &part.body))
        },
        Some(s::SectionText::Header) | Some(s::SectionText::Mime) => {
            Cow::Borrowed(slice(raw, &part.header))
        },
        Some(s::SectionText::HeaderFields(ref fields)) => {
            Cow::Owned(header_fields(slice(raw, &part.header), fields, true))
        },
        Some(s::SectionText::HeaderFieldsNot(ref fields)) => {
            Cow::Owned(header_fields(slice(raw, &part.header), fields, false))
        },
    }
}

/// Filters a header block down to the fields whose name is (`keep` true) or
/// is not (`keep` false) in `names`, keeping folded continuation lines with
/// their field. The result ends with a blank line.
fn header_fields(header: &[u8], names: &[String], keep: bool) -> Vec<u8> {
    let mut out = Vec::new();
    let mut keeping = false;
    for line in header.split_inclusive(|&b| b'\n' == b) {
        if line.starts_with(b" ") || line.starts_with(b"\t") {
            if keeping {
                out.extend_from_slice(line);
            }
            continue;
        }

        if b"\r\n" == line || b"\n" == line {
            break;
        }

        let name = line
            .splitn(2, |&b| b':' == b)
            .next()
            .and_then(|name| std::str::from_utf8(name).ok())
            .unwrap_or("")
            .trim();
        keeping = keep
            == names.iter().any(|n| n.eq_ignore_ascii_case(name));
        if keeping {
            out.extend_from_slice(line);
        }
    }

    out.extend_from_slice(b"\r\n");
    out
}

fn write_envelope(
    w: &mut LexWriter<impl Write>,
    msg: &ParsedMessage,
) -> io::Result<()> {
    let from = msg.from.as_ref().map(std::slice::from_ref).unwrap_or(&[]);
    // Sender and Reply-To default to From.
    let sender = msg.sender.as_ref().map_or(from, std::slice::from_ref);
    let reply_to = msg.reply_to.as_ref().map_or(from, std::slice::from_ref);

    w.verbatim("(")?;
    w.censored_nstring(msg.date_header.as_deref())?;
    w.verbatim(" ")?;
    w.encoded_nstring(Some(&msg.subject).filter(|s| !s.is_empty()).map(
        String::as_str,
    ))?;
    for people in &[from, sender, reply_to, &msg.to, &msg.cc, &msg.bcc] {
        w.verbatim(" ")?;
        write_addresses(w, people)?;
    }
    w.verbatim(" ")?;
    w.censored_nstring(msg.header("in-reply-to"))?;
    w.verbatim(" ")?;
    w.censored_nstring(msg.header("message-id"))?;
    w.verbatim(")")
}

fn write_addresses(
    w: &mut LexWriter<impl Write>,
    people: &[Person],
) -> io::Result<()> {
    if people.is_empty() {
        return w.nil();
    }

    w.verbatim("(")?;
    for person in people {
        let (local, domain) = match person.email.rfind('@') {
            Some(at) => (&person.email[..at], Some(&person.email[at + 1..])),
            None => (person.email.as_str(), None),
        };

        w.verbatim("(")?;
        w.encoded_nstring(person.name.as_deref())?;
        w.verbatim(" NIL ")?;
        w.censored_nstring(Some(local))?;
        w.verbatim(" ")?;
        w.censored_nstring(domain)?;
        w.verbatim(")")?;
    }
    w.verbatim(")")
}

/// Writes `BODY` (`extended` false) or `BODYSTRUCTURE` (`extended` true)
/// for `part`.
fn write_body(
    w: &mut LexWriter<impl Write>,
    part: &MimePart,
    extended: bool,
) -> io::Result<()> {
    w.verbatim("(")?;
    if part.is_multipart() && !part.children.is_empty() {
        for child in &part.children {
            write_body(w, child, extended)?;
        }
        w.verbatim(" ")?;
        w.censored_nstring(Some(&part.subtype.to_uppercase()))?;
        if extended {
            w.verbatim(" ")?;
            write_params(w, &part.params)?;
            w.verbatim(" ")?;
            write_disposition(w, part)?;
            w.verbatim(" NIL NIL")?;
        }
        return w.verbatim(")");
    }

    let is_text = "text" == part.content_type;
    w.censored_nstring(Some(&part.content_type.to_uppercase()))?;
    w.verbatim(" ")?;
    w.censored_nstring(Some(&part.subtype.to_uppercase()))?;
    w.verbatim(" ")?;
    write_params(w, &part.params)?;
    w.verbatim(" ")?;
    w.censored_nstring(part.content_id.as_deref())?;
    w.verbatim(" ")?;
    w.encoded_nstring(part.description.as_deref())?;
    w.verbatim(" ")?;
    w.censored_nstring(Some(&part.encoding.to_uppercase()))?;
    w.verbatim(" ")?;
    w.num(part.body.len() as u64)?;
    if is_text {
        w.verbatim(" ")?;
        w.num(part.lines as u64)?;
    }
    if extended {
        w.verbatim(" NIL ")?;
        write_disposition(w, part)?;
        w.verbatim(" NIL NIL")?;
    }
    w.verbatim(")")
}

fn write_params(
    w: &mut LexWriter<impl Write>,
    params: &[(String, String)],
) -> io::Result<()> {
    if params.is_empty() {
        return w.nil();
    }

    w.verbatim("(")?;
    for (ix, &(ref k, ref v)) in params.iter().enumerate() {
        if ix > 0 {
            w.verbatim(" ")?;
        }
        w.censored_nstring(Some(&k.to_uppercase()))?;
        w.verbatim(" ")?;
        w.censored_nstring(Some(v))?;
    }
    w.verbatim(")")
}

fn write_disposition(
    w: &mut LexWriter<impl Write>,
    part: &MimePart,
) -> io::Result<()> {
    let disposition = match part.disposition {
        None => return w.nil(),
        Some(ref d) => d,
    };

    w.verbatim("(")?;
    w.censored_nstring(Some(&disposition.to_uppercase()))?;
    w.verbatim(" ")?;
    match part.filename {
        None => w.nil()?,
        Some(ref filename) => {
            w.verbatim("(\"FILENAME\" ")?;
            w.encoded_nstring(Some(filename))?;
            w.verbatim(")")?;
        },
    }
    w.verbatim(")")
}
