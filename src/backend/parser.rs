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

//! A lightweight RFC 5322 / MIME structure parser.
//!
//! This does no transfer decoding. It finds header fields, addresses, the
//! identifiers used for threading, mailing-list hints and the byte ranges of
//! every MIME part, which is all the index and the IMAP layer need.

use std::ops::Range;

use chrono::prelude::*;
use lazy_static::lazy_static;
use regex::Regex;
use tiny_keccak::{Hasher, Sha3};

use super::*;
use crate::support::error::Error;

/// Multipart nesting beyond this depth is treated as opaque.
const MAX_DEPTH: u32 = 16;
const SNIPPET_LEN: usize = 100;

lazy_static! {
    static ref HEADER_END: regex::bytes::Regex =
        regex::bytes::Regex::new(r"\r?\n\r?\n").unwrap();
    static ref ANGLE_ID: Regex = Regex::new(r"<([^<>\s]+)>").unwrap();
    static ref NAMED_ADDRESS: Regex =
        Regex::new(r#"^\s*"?([^"<]*?)"?\s*<([^<>]*)>\s*$"#).unwrap();
    static ref COMMENTED_ADDRESS: Regex =
        Regex::new(r"^\s*(\S+@\S+)\s*\(([^)]*)\)\s*$").unwrap();
    static ref TRAILING_COMMENT: Regex =
        Regex::new(r"\s*\([^)]*\)\s*$").unwrap();
    static ref MAILING_LIST: Regex =
        Regex::new(r"(?i)list\s+(\S+@\S+)").unwrap();
    static ref MAILTO: Regex = Regex::new(r"<mailto:([^>?]+)").unwrap();
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
}

/// The default `MessageParser`.
#[derive(Clone, Copy, Debug, Default)]
pub struct HeaderParser;

impl MessageParser for HeaderParser {
    fn parse(&self, data: &[u8]) -> Result<ParsedMessage, Error> {
        if data.is_empty() {
            return Err(Error::InvalidMessage("empty message".to_owned()));
        }

        let root = parse_part(data, 0..data.len(), 0);
        let headers = parse_headers(&data[root.header.clone()]);
        let mut msg = ParsedMessage {
            headers,
            ..ParsedMessage::default()
        };

        msg.from = msg.header("from").and_then(first_address);
        msg.sender = msg.header("sender").and_then(first_address);
        msg.reply_to = msg.header("reply-to").and_then(first_address);
        msg.to = msg.header("to").map(parse_addresses).unwrap_or_default();
        msg.cc = msg.header("cc").map(parse_addresses).unwrap_or_default();
        msg.bcc = msg.header("bcc").map(parse_addresses).unwrap_or_default();
        msg.subject = msg.header("subject").unwrap_or_default().to_owned();
        msg.date_header = msg.header("date").map(str::to_owned);
        msg.date = msg
            .date_header
            .as_deref()
            .and_then(parse_date)
            .unwrap_or_else(|| Utc::now().timestamp());

        msg.message_id = match msg.header("message-id").and_then(first_id) {
            Some(id) => id,
            None => format!(
                "{}-defaulted-{}@labelmap",
                msg.date,
                &sha3_hex(&data[root.header.clone()])[..16]
            ),
        };
        msg.safe_id = sha3_hex(msg.message_id.as_bytes());

        msg.refs = msg.header("references").map(all_ids).unwrap_or_default();
        msg.in_reply_to =
            msg.header("in-reply-to").map(all_ids).unwrap_or_default();
        for id in &msg.in_reply_to {
            if !msg.refs.contains(id) {
                msg.refs.push(id.clone());
            }
        }

        msg.list_name = guess_list_name(&msg);
        msg.list_post = msg.header("list-post").map(str::to_owned);
        msg.list_subscribe = msg.header("list-subscribe").map(str::to_owned);
        msg.list_unsubscribe =
            msg.header("list-unsubscribe").map(str::to_owned);
        msg.mail_count = msg
            .header("x-mail-count")
            .and_then(|v| v.trim().parse().ok());

        let mut text = msg.subject.clone();
        let mut snippet_source = None;
        visit_leaves(&root, &mut |part| {
            if part.disposition.as_deref() == Some("attachment")
                || part.filename.is_some()
            {
                msg.has_attachment = true;
            } else if "text" == part.content_type {
                let body = String::from_utf8_lossy(&data[part.body.clone()]);
                text.push('\n');
                text.push_str(&body);
                if snippet_source.is_none() && "plain" == part.subtype {
                    snippet_source = Some(part.body.clone());
                }
            }
        });
        visit_all(&root, &mut |part| {
            if part.is_multipart() {
                msg.signed |= "signed" == part.subtype;
                msg.encrypted |= "encrypted" == part.subtype;
            }
        });

        msg.snippet = snippet_source
            .map(|r| make_snippet(&String::from_utf8_lossy(&data[r])))
            .unwrap_or_default();
        msg.text = text;
        msg.root = root;
        Ok(msg)
    }
}

fn parse_part(data: &[u8], range: Range<usize>, depth: u32) -> MimePart {
    let (header, body) = split_header(data, range);
    let headers = parse_headers(&data[header.clone()]);
    let find = |name: &str| {
        headers
            .iter()
            .find(|&&(ref k, _)| k == name)
            .map(|&(_, ref v)| v.as_str())
    };

    let (content_type, subtype, params) =
        parse_content_type(find("content-type").unwrap_or("text/plain"));
    let (disposition, disposition_params) = match find("content-disposition")
    {
        Some(v) => {
            let (d, params) = split_params(v);
            (Some(d.to_lowercase()), params)
        },
        None => (None, Vec::new()),
    };
    let filename = disposition_params
        .iter()
        .chain(params.iter())
        .find(|&&(ref k, _)| "filename" == k || "name" == k)
        .map(|&(_, ref v)| v.clone());

    let mut part = MimePart {
        content_type,
        subtype,
        params,
        content_id: find("content-id").map(str::to_owned),
        description: find("content-description").map(str::to_owned),
        encoding: find("content-transfer-encoding")
            .unwrap_or("7bit")
            .trim()
            .to_lowercase(),
        disposition,
        filename,
        lines: data[body.clone()].iter().filter(|&&b| b'\n' == b).count(),
        header,
        body,
        children: Vec::new(),
    };

    if part.is_multipart() && depth < MAX_DEPTH {
        if let Some(boundary) = part.param("boundary").map(str::to_owned) {
            part.children =
                split_multipart(data, part.body.clone(), &boundary)
                    .into_iter()
                    .map(|r| parse_part(data, r, depth + 1))
                    .collect();
        }
    }

    part
}

/// Splits `range` into the header block (with its terminating blank line)
/// and the body.
fn split_header(
    data: &[u8],
    range: Range<usize>,
) -> (Range<usize>, Range<usize>) {
    let slice = &data[range.clone()];
    // A part which starts with a blank line has no header at all.
    let leading_blank = if slice.starts_with(b"\r\n") {
        Some(2)
    } else if slice.starts_with(b"\n") {
        Some(1)
    } else {
        None
    };

    if let Some(len) = leading_blank {
        let split = range.start + len;
        return (range.start..split, split..range.end);
    }

    match HEADER_END.find(slice) {
        Some(m) => {
            let split = range.start + m.end();
            (range.start..split, split..range.end)
        },
        None => (range.clone(), range.end..range.end),
    }
}

fn split_multipart(
    data: &[u8],
    body: Range<usize>,
    boundary: &str,
) -> Vec<Range<usize>> {
    let delimiter = format!("--{}", boundary);
    let mut parts = Vec::new();
    let mut start: Option<usize> = None;
    let mut pos = body.start;

    while pos < body.end {
        let line_end = memchr::memchr(b'\n', &data[pos..body.end])
            .map_or(body.end, |n| pos + n + 1);
        let line = &data[pos..line_end];

        if line.starts_with(delimiter.as_bytes()) {
            if let Some(s) = start.take() {
                // The line break before the delimiter belongs to it.
                let mut end = pos;
                if end > s && b'\n' == data[end - 1] {
                    end -= 1;
                    if end > s && b'\r' == data[end - 1] {
                        end -= 1;
                    }
                }
                parts.push(s..end);
            }

            if line[delimiter.len()..].starts_with(b"--") {
                break;
            }
            start = Some(line_end);
        }

        pos = line_end;
    }

    parts
}

/// Parses and unfolds a header block.
fn parse_headers(block: &[u8]) -> Vec<(String, String)> {
    let text = String::from_utf8_lossy(block);
    let mut headers: Vec<(String, String)> = Vec::new();

    for line in text.split('\n') {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            continue;
        }

        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some(&mut (_, ref mut value)) = headers.last_mut() {
                value.push(' ');
                value.push_str(line.trim());
            }
            continue;
        }

        if let Some(colon) = line.find(':') {
            headers.push((
                line[..colon].trim().to_lowercase(),
                line[colon + 1..].trim().to_owned(),
            ));
        }
    }

    headers
}

fn parse_content_type(v: &str) -> (String, String, Vec<(String, String)>) {
    let (typ, params) = split_params(v);
    let typ = typ.to_lowercase();
    let mut split = typ.splitn(2, '/');
    let primary = split.next().unwrap_or("text").trim().to_owned();
    let subtype = split.next().unwrap_or("plain").trim().to_owned();
    (primary, subtype, params)
}

/// Splits `value; k=v; k2="v 2"` into the value and its parameters.
fn split_params(v: &str) -> (&str, Vec<(String, String)>) {
    let mut pieces = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;
    for (ix, ch) in v.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ';' if !in_quotes => {
                pieces.push(&v[start..ix]);
                start = ix + 1;
            },
            _ => (),
        }
    }
    pieces.push(&v[start..]);

    let head = pieces[0].trim();
    let params = pieces[1..]
        .iter()
        .filter_map(|p| {
            let eq = p.find('=')?;
            Some((
                p[..eq].trim().to_lowercase(),
                p[eq + 1..].trim().trim_matches('"').to_owned(),
            ))
        })
        .collect();
    (head, params)
}

fn parse_addresses(v: &str) -> Vec<Person> {
    let mut out = Vec::new();
    let mut in_quotes = false;
    let mut in_angle = false;
    let mut start = 0;
    for (ix, ch) in v.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            '<' if !in_quotes => in_angle = true,
            '>' if !in_quotes => in_angle = false,
            ',' if !in_quotes && !in_angle => {
                out.extend(parse_address(&v[start..ix]));
                start = ix + 1;
            },
            _ => (),
        }
    }
    out.extend(parse_address(&v[start..]));
    out
}

fn parse_address(v: &str) -> Option<Person> {
    let v = v.trim();
    if v.is_empty() {
        return None;
    }

    if let Some(cap) = NAMED_ADDRESS.captures(v) {
        let name = cap[1].trim();
        return Some(Person {
            name: if name.is_empty() {
                None
            } else {
                Some(name.to_owned())
            },
            email: cap[2].trim().to_owned(),
        });
    }

    if let Some(cap) = COMMENTED_ADDRESS.captures(v) {
        return Some(Person {
            name: Some(cap[2].trim().to_owned()),
            email: cap[1].to_owned(),
        });
    }

    Some(Person {
        name: None,
        email: v.to_owned(),
    })
}

fn first_address(v: &str) -> Option<Person> {
    parse_addresses(v).into_iter().next()
}

fn parse_date(v: &str) -> Option<i64> {
    let v = TRAILING_COMMENT.replace(v.trim(), "");
    DateTime::parse_from_rfc2822(&v).ok().map(|d| d.timestamp())
}

fn first_id(v: &str) -> Option<String> {
    ANGLE_ID
        .captures(v)
        .map(|c| c[1].to_owned())
        .or_else(|| {
            let v = v.trim();
            if v.is_empty() || v.contains(char::is_whitespace) {
                None
            } else {
                Some(v.to_owned())
            }
        })
}

fn all_ids(v: &str) -> Vec<String> {
    ANGLE_ID.captures_iter(v).map(|c| c[1].to_owned()).collect()
}

fn guess_list_name(msg: &ParsedMessage) -> Option<String> {
    if let Some(v) = msg.header("list-id") {
        if let Some(id) = first_id(v) {
            return Some(id);
        }
    }

    if let Some(v) = msg.header("x-ml-name") {
        return Some(v.trim().to_owned());
    }

    if let Some(cap) = msg
        .header("mailing-list")
        .and_then(|v| MAILING_LIST.captures(v))
    {
        return Some(cap[1].to_owned());
    }

    if let Some(v) = msg.header("x-mailing-list") {
        return Some(
            v.trim()
                .trim_matches(|c: char| '<' == c || '>' == c)
                .to_owned(),
        );
    }

    msg.header("list-post")
        .and_then(|v| MAILTO.captures(v))
        .map(|cap| cap[1].to_owned())
}

fn make_snippet(body: &str) -> String {
    let text = body
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('>'))
        .take_while(|l| "--" != *l)
        .collect::<Vec<_>>()
        .join(" ");
    let text = WHITESPACE.replace_all(&text, " ");
    text.chars().take(SNIPPET_LEN).collect()
}

fn visit_leaves<'a>(part: &'a MimePart, f: &mut impl FnMut(&'a MimePart)) {
    if part.children.is_empty() {
        f(part);
    } else {
        for child in &part.children {
            visit_leaves(child, f);
        }
    }
}

fn visit_all<'a>(part: &'a MimePart, f: &mut impl FnMut(&'a MimePart)) {
    f(part);
    for child in &part.children {
        visit_all(child, f);
    }
}

fn sha3_hex(data: &[u8]) -> String {
    let mut hasher = Sha3::v256();
    hasher.update(data);
    let mut hash = [0u8; 32];
    hasher.finalize(&mut hash);
    hash.iter().map(|b| format!("{:02x}", b)).collect()
}
