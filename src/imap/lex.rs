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

//! Utilities for *writing* values under IMAP's "lexical rules".
//!
//! Reading is the tokenizer's job; this is only concerned with choosing an
//! encoding for outgoing strings.
//!
//! # Encoding Decisions
//!
//! We're generally pretty conservative here.
//!
//! Given the choice between encoding a string as an atom-like value or some
//! other form, we only use atom if all characters are in the set
//! `a-zA-Z0-9?=+/_.-` and the string is not "NIL".
//!
//! Given the choice between encoding a string as a quoted string or a literal,
//! we only choose the quoted string if it only contains characters other than
//! controls, backslash, double-quote, non-ASCII, and is less than 100 bytes
//! long.
//!
//! Mailbox names in `LIST` and `STATUS` responses are always quoted, with CR
//! and LF removed and backslash and double-quote escaped. Free text in an
//! envelope which is not ASCII becomes RFC 2047 encoded words.

use std::borrow::Cow;
use std::io::{self, Write};

use chrono::prelude::*;

#[derive(Clone, Copy, Debug)]
pub struct LexWriter<W> {
    writer: W,
}

impl<W: Write> LexWriter<W> {
    pub fn new(writer: W) -> Self {
        LexWriter { writer }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.writer
    }

    pub fn verbatim(&mut self, s: &str) -> io::Result<()> {
        self.writer.write_all(s.as_bytes())
    }

    pub fn raw(&mut self, data: &[u8]) -> io::Result<()> {
        self.writer.write_all(data)
    }

    pub fn nil(&mut self) -> io::Result<()> {
        self.verbatim("NIL")
    }

    pub fn num(&mut self, n: u64) -> io::Result<()> {
        write!(self.writer, "{}", n)
    }

    /// Writes `s` as a quoted string no matter what it contains.
    pub fn quoted(&mut self, s: &str) -> io::Result<()> {
        self.writer.write_all(b"\"")?;
        for ch in s.chars() {
            match ch {
                '\r' | '\n' => (),
                '\\' | '"' => write!(self.writer, "\\{}", ch)?,
                ch => write!(self.writer, "{}", ch)?,
            }
        }
        self.writer.write_all(b"\"")
    }

    pub fn nquoted(&mut self, s: Option<&str>) -> io::Result<()> {
        match s {
            None => self.nil(),
            Some(s) => self.quoted(s),
        }
    }

    pub fn literal(&mut self, data: &[u8]) -> io::Result<()> {
        write!(self.writer, "{{{}}}\r\n", data.len())?;
        self.writer.write_all(data)
    }

    pub fn string(&mut self, s: &str) -> io::Result<()> {
        if is_quotable(s) {
            write!(self.writer, "\"{}\"", s)
        } else {
            self.literal(s.as_bytes())
        }
    }

    pub fn nstring(&mut self, s: Option<&str>) -> io::Result<()> {
        match s {
            None => self.nil(),
            Some(s) => self.string(s),
        }
    }

    pub fn astring(&mut self, s: &str) -> io::Result<()> {
        if is_conservative_atom(s) {
            self.verbatim(s)
        } else {
            self.string(s)
        }
    }

    /// Like `nstring`, but non-ASCII text is sent as encoded words.
    pub fn encoded_nstring(&mut self, s: Option<&str>) -> io::Result<()> {
        match s {
            None => self.nil(),
            Some(s) => self.string(&encode(s)),
        }
    }

    /// Like `nstring`, but non-ASCII characters are replaced with `X`.
    ///
    /// This is for things like email addresses which cannot carry encoded
    /// words.
    pub fn censored_nstring(&mut self, s: Option<&str>) -> io::Result<()> {
        match s {
            None => self.nil(),
            Some(s) => self.string(&censor(s)),
        }
    }

    pub fn datetime(
        &mut self,
        datetime: &DateTime<FixedOffset>,
    ) -> io::Result<()> {
        write!(
            self.writer,
            "\"{}\"",
            datetime.format("%d-%b-%Y %H:%M:%S %z")
        )
    }
}

fn censor(s: &str) -> Cow<'_, str> {
    if s.is_ascii() {
        Cow::Borrowed(s)
    } else {
        Cow::Owned(s.replace(|ch: char| !ch.is_ascii(), "X"))
    }
}

fn encode(s: &str) -> Cow<'_, str> {
    if s.is_ascii() {
        return Cow::Borrowed(s);
    }

    let mut total_accum = String::new();
    let mut part_accum = String::new();
    let mut first = true;
    // Encoded words may be at most 76 characters, which leaves room for 48
    // raw bytes. Breaking at 40 keeps multi-byte characters whole.
    for c in s.chars() {
        part_accum.push(c);
        if part_accum.len() > 40 {
            encode_part(&mut total_accum, &part_accum, first);
            part_accum.clear();
            first = false;
        }
    }

    encode_part(&mut total_accum, &part_accum, first);
    Cow::Owned(total_accum)
}

fn encode_part(dst: &mut String, src: &str, first: bool) {
    if src.is_empty() {
        return;
    }

    if !first {
        dst.push(' ');
    }

    dst.push_str("=?utf-8?b?");
    dst.push_str(&base64::encode_config(src, base64::STANDARD_NO_PAD));
    dst.push_str("?=");
}

pub fn is_conservative_atom(s: &str) -> bool {
    !"nil".eq_ignore_ascii_case(s)
        && !s.is_empty()
        && s.as_bytes().iter().copied().all(|b| {
            matches!(
                b,
                b'a'..=b'z'
                    | b'A'..=b'Z'
                    | b'0'..=b'9'
                    | b'='
                    | b'?'
                    | b'/'
                    | b'+'
                    | b'_'
                    | b'.'
                    | b'-'
            )
        })
}

pub fn is_quotable(s: &str) -> bool {
    s.len() < 100
        && s.as_bytes().iter().copied().all(|b| match b {
            0..=31 | 127..=255 | b'\\' | b'"' => false,
            _ => true,
        })
}
