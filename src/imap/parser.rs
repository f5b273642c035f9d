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

//! Recursive-descent parser for one complete command line.
//!
//! The input is everything the client sent for one command, with literal
//! payloads inline, exactly as the request reader accumulated it. Which
//! commands are accepted depends on the connection state; anything else
//! becomes `Command::Unrecognized` without its arguments being looked at.

use std::borrow::Cow;

use chrono::prelude::*;
use lazy_static::lazy_static;
use regex::Regex;

use super::syntax::*;
use super::tokenizer::{LexMode, Lexer, Token, TokenKind};
use crate::backend::SearchQuery;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    NotAuthenticated,
    Authenticated,
    Selected,
    Logout,
}

/// Which command names are legal in which connection state.
#[derive(Clone, Debug)]
pub struct CommandTable {
    not_authenticated: Vec<&'static str>,
    authenticated: Vec<&'static str>,
    selected: Vec<&'static str>,
}

const UNIVERSAL_COMMANDS: &[&str] =
    &["CAPABILITY", "STARTTLS", "NOOP", "LOGOUT"];
const NOT_AUTHENTICATED_COMMANDS: &[&str] = &["AUTHENTICATE", "LOGIN"];
const AUTHENTICATED_COMMANDS: &[&str] = &[
    "SELECT",
    "EXAMINE",
    "CREATE",
    "DELETE",
    "RENAME",
    "SUBSCRIBE",
    "UNSUBSCRIBE",
    "LIST",
    "LSUB",
    "STATUS",
    "APPEND",
    "IDLE",
];
const SELECTED_COMMANDS: &[&str] = &[
    "CHECK",
    "CLOSE",
    "EXPUNGE",
    "SEARCH",
    "UID SEARCH",
    "FETCH",
    "UID FETCH",
    "STORE",
    "UID STORE",
    "COPY",
    "UID COPY",
];

impl CommandTable {
    pub fn standard() -> Self {
        let not_authenticated: Vec<_> = UNIVERSAL_COMMANDS
            .iter()
            .chain(NOT_AUTHENTICATED_COMMANDS)
            .copied()
            .collect();
        let authenticated: Vec<_> = UNIVERSAL_COMMANDS
            .iter()
            .chain(AUTHENTICATED_COMMANDS)
            .copied()
            .collect();
        let selected: Vec<_> = authenticated
            .iter()
            .chain(SELECTED_COMMANDS)
            .copied()
            .collect();

        CommandTable {
            not_authenticated,
            authenticated,
            selected,
        }
    }

    pub fn is_legal(&self, state: ConnectionState, name: &str) -> bool {
        let names = match state {
            ConnectionState::NotAuthenticated => &self.not_authenticated,
            ConnectionState::Authenticated => &self.authenticated,
            ConnectionState::Selected => &self.selected,
            ConnectionState::Logout => return false,
        };
        names.contains(&name)
    }
}

/// What the parser needs to know about the session.
#[derive(Clone, Debug)]
pub struct ParseContext<'c> {
    pub state: ConnectionState,
    pub commands: &'c CommandTable,
    /// The query matching everything in the selected mailbox; `NOT` in a
    /// search is relative to this.
    pub mailbox_query: SearchQuery,
    /// The greatest UID in the selected mailbox, which `*` stands for in a
    /// `UID` search key.
    pub last_uid: u64,
}

/// Parses one command line.
///
/// On failure, the returned error carries the tag if one was read.
pub fn parse_command_line(
    input: &[u8],
    ctx: &ParseContext<'_>,
) -> Result<CommandLine, ParseError> {
    let mut parser = CommandParser::new(input, ctx);
    let mut tag = None;
    parser.command_line(&mut tag).map_err(|mut e| {
        e.tag = tag;
        e
    })
}

const ATOM_TOKENS: &[TokenKind] = &[
    TokenKind::Atom,
    TokenKind::Number,
    TokenKind::Nil,
    TokenKind::LBra,
    TokenKind::RBra,
    TokenKind::Plus,
];

const LIST_MAILBOX_TOKENS: &[TokenKind] = &[
    TokenKind::Atom,
    TokenKind::Number,
    TokenKind::Nil,
    TokenKind::LBra,
    TokenKind::RBra,
    TokenKind::Plus,
    TokenKind::Star,
    TokenKind::Percent,
];

const SECTION_TOKENS: &[TokenKind] = &[
    TokenKind::Atom,
    TokenKind::Number,
    TokenKind::Nil,
    TokenKind::Plus,
];

lazy_static! {
    static ref SECTION_HEADER_OR_TEXT: Regex =
        Regex::new(r"(?i)^(?:([0-9.]+)\.)?(HEADER|TEXT)$").unwrap();
    static ref SECTION_HEADER_FIELDS: Regex =
        Regex::new(r"(?i)^(?:([0-9.]+)\.)?HEADER\.FIELDS(\.NOT)?$").unwrap();
    static ref SECTION_MIME: Regex =
        Regex::new(r"(?i)^([0-9.]+)\.MIME$").unwrap();
    static ref SECTION_PART: Regex = Regex::new(r"^([0-9.]+)$").unwrap();
    static ref PARTIAL: Regex = Regex::new(r"^<([0-9]+)\.([0-9]+)>$").unwrap();
    static ref STORE_ITEM: Regex =
        Regex::new(r"(?i)^([+-]?)FLAGS(\.SILENT)?$").unwrap();
}

pub(super) struct CommandParser<'a, 'c> {
    lexer: Lexer<'a>,
    /// The token at the lexer's position under the given mode, and where it
    /// ends.
    lookahead: Option<(LexMode, Token<'a>, usize)>,
    pub(super) ctx: &'c ParseContext<'c>,
}

impl<'a, 'c> CommandParser<'a, 'c> {
    pub(super) fn new(input: &'a [u8], ctx: &'c ParseContext<'c>) -> Self {
        CommandParser {
            lexer: Lexer::new(input),
            lookahead: None,
            ctx,
        }
    }

    pub(super) fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(message, self.lexer.position())
    }

    pub(super) fn peek_in(
        &mut self,
        mode: LexMode,
    ) -> Result<Token<'a>, ParseError> {
        if let Some((cached_mode, ref token, _)) = self.lookahead {
            if cached_mode == mode {
                return Ok(token.clone());
            }
        }

        let (token, end) = self.lexer.peek(mode)?;
        self.lookahead = Some((mode, token.clone(), end));
        Ok(token)
    }

    pub(super) fn peek(&mut self) -> Result<Token<'a>, ParseError> {
        self.peek_in(LexMode::Beg)
    }

    pub(super) fn shift(&mut self) {
        if let Some((_, _, end)) = self.lookahead.take() {
            self.lexer.advance(end);
        }
    }

    pub(super) fn expect_in(
        &mut self,
        mode: LexMode,
        kinds: &[TokenKind],
    ) -> Result<Token<'a>, ParseError> {
        let token = self.peek_in(mode)?;
        if !kinds.contains(&token.kind) {
            return Err(self.error(format!(
                "unexpected token {} (expected {})",
                token.kind,
                kinds
                    .iter()
                    .map(|k| k.to_string())
                    .collect::<Vec<_>>()
                    .join(" or ")
            )));
        }

        self.shift();
        Ok(token)
    }

    pub(super) fn expect(
        &mut self,
        kind: TokenKind,
    ) -> Result<Token<'a>, ParseError> {
        self.expect_in(LexMode::Beg, &[kind])
    }

    pub(super) fn space(&mut self) -> Result<(), ParseError> {
        self.expect(TokenKind::Space).map(|_| ())
    }

    /// Concatenates a non-empty run of tokens of the given kinds.
    pub(super) fn tokens(
        &mut self,
        kinds: &[TokenKind],
    ) -> Result<String, ParseError> {
        let mut result = Vec::new();
        loop {
            let token = self.peek()?;
            if kinds.contains(&token.kind) {
                result.extend_from_slice(&token.value);
                self.shift();
            } else if result.is_empty() {
                return Err(
                    self.error(format!("unexpected token {}", token.kind))
                );
            } else {
                return Ok(String::from_utf8_lossy(&result).into_owned());
            }
        }
    }

    pub(super) fn atom(&mut self) -> Result<String, ParseError> {
        self.tokens(ATOM_TOKENS)
    }

    pub(super) fn is_keyword(token: &Token<'_>, keyword: &str) -> bool {
        TokenKind::Atom == token.kind
            && token.value.eq_ignore_ascii_case(keyword.as_bytes())
    }

    /// A string or an atom, as raw bytes.
    pub(super) fn astring_bytes(
        &mut self,
    ) -> Result<Cow<'a, [u8]>, ParseError> {
        let token = self.peek()?;
        match token.kind {
            TokenKind::Quoted | TokenKind::Literal => {
                self.shift();
                Ok(token.value)
            },
            _ => self.atom().map(|a| Cow::Owned(a.into_bytes())),
        }
    }

    pub(super) fn astring(&mut self) -> Result<String, ParseError> {
        self.astring_bytes()
            .map(|b| String::from_utf8_lossy(&b).into_owned())
    }

    fn mailbox(&mut self) -> Result<String, ParseError> {
        self.astring().map(fold_inbox)
    }

    pub(super) fn number(&mut self) -> Result<u64, ParseError> {
        let token = self.expect_in(LexMode::Data, &[TokenKind::Number])?;
        token
            .text()
            .parse::<u64>()
            .map_err(|_| {
                self.error(format!("number too large: {}", token.text()))
            })
    }

    fn command_line(
        &mut self,
        tag_out: &mut Option<String>,
    ) -> Result<CommandLine, ParseError> {
        if self.at_line_end()? {
            return Ok(CommandLine {
                tag: None,
                name: String::new(),
                cmd: Command::Null,
            });
        }

        let tag = self.atom()?;
        *tag_out = Some(tag.clone());

        if self.at_line_end()? {
            return Ok(CommandLine {
                tag: Some(tag),
                name: String::new(),
                cmd: Command::Missing,
            });
        }

        self.space()?;
        let mut name = self.atom()?.to_ascii_uppercase();
        if "UID" == name {
            self.space()?;
            name.push(' ');
            name.push_str(&self.atom()?.to_ascii_uppercase());
        }

        if !self.ctx.commands.is_legal(self.ctx.state, &name) {
            return Ok(CommandLine {
                tag: Some(tag),
                name,
                cmd: Command::Unrecognized {
                    login_hint: ConnectionState::NotAuthenticated
                        == self.ctx.state,
                },
            });
        }

        let cmd = self.command(&name)?;
        if TokenKind::Crlf == self.peek()?.kind {
            self.shift();
        }
        self.expect(TokenKind::Eof)?;

        Ok(CommandLine {
            tag: Some(tag),
            name,
            cmd,
        })
    }

    fn at_line_end(&mut self) -> Result<bool, ParseError> {
        let kind = self.peek()?.kind;
        Ok(TokenKind::Crlf == kind || TokenKind::Eof == kind)
    }

    fn command(&mut self, name: &str) -> Result<Command, ParseError> {
        match name {
            "CAPABILITY" => Ok(Command::Capability),
            "STARTTLS" => Ok(Command::StartTls),
            "NOOP" | "CHECK" => Ok(Command::Noop),
            "LOGOUT" => Ok(Command::Logout),
            "AUTHENTICATE" => {
                self.space()?;
                Ok(Command::Authenticate {
                    mechanism: self.atom()?.to_ascii_uppercase(),
                })
            },
            "LOGIN" => {
                self.space()?;
                let userid = self.astring()?;
                self.space()?;
                let password = self.astring()?;
                Ok(Command::Login { userid, password })
            },
            "SELECT" => self.space_mailbox().map(Command::Select),
            "EXAMINE" => self.space_mailbox().map(Command::Examine),
            "CREATE" => self.space_mailbox().map(Command::Create),
            "DELETE" => self.space_mailbox().map(Command::Delete),
            "SUBSCRIBE" | "UNSUBSCRIBE" => {
                self.space_mailbox().map(|_| Command::Noop)
            },
            "RENAME" => {
                let src = self.space_mailbox()?;
                let dst = self.space_mailbox()?;
                Ok(Command::Rename { src, dst })
            },
            "LIST" => {
                let (reference, pattern) = self.list_args()?;
                Ok(Command::List { reference, pattern })
            },
            "LSUB" => {
                let (reference, pattern) = self.list_args()?;
                Ok(Command::Lsub { reference, pattern })
            },
            "STATUS" => self.status(),
            "APPEND" => self.append(),
            "IDLE" => Ok(Command::Idle),
            "CLOSE" => Ok(Command::Close),
            "EXPUNGE" => Ok(Command::Expunge),
            "SEARCH" => self.search(false),
            "UID SEARCH" => self.search(true),
            "FETCH" => self.fetch(false),
            "UID FETCH" => self.fetch(true),
            "STORE" => self.store(false),
            "UID STORE" => self.store(true),
            "COPY" => self.copy(false),
            "UID COPY" => self.copy(true),
            _ => Err(self.error(format!("unhandled command {}", name))),
        }
    }

    fn space_mailbox(&mut self) -> Result<String, ParseError> {
        self.space()?;
        self.mailbox()
    }

    fn list_args(&mut self) -> Result<(String, String), ParseError> {
        let reference = self.space_mailbox()?;
        self.space()?;

        let token = self.peek()?;
        let pattern = match token.kind {
            TokenKind::Quoted | TokenKind::Literal => {
                self.shift();
                token.text().into_owned()
            },
            _ => self.tokens(LIST_MAILBOX_TOKENS)?,
        };

        Ok((reference, fold_inbox(pattern)))
    }

    fn status(&mut self) -> Result<Command, ParseError> {
        let mailbox = self.space_mailbox()?;
        self.space()?;
        self.expect(TokenKind::LPar)?;

        let mut atts = vec![self.status_att()?];
        while TokenKind::RPar != self.peek()?.kind {
            self.space()?;
            atts.push(self.status_att()?);
        }
        self.shift();

        Ok(Command::Status { mailbox, atts })
    }

    fn status_att(&mut self) -> Result<StatusAtt, ParseError> {
        let att = self.atom()?.to_ascii_uppercase();
        match &att[..] {
            "MESSAGES" => Ok(StatusAtt::Messages),
            "RECENT" => Ok(StatusAtt::Recent),
            "UIDNEXT" => Ok(StatusAtt::UidNext),
            "UIDVALIDITY" => Ok(StatusAtt::UidValidity),
            "UNSEEN" => Ok(StatusAtt::Unseen),
            _ => Err(self.error(format!("unknown status attribute {}", att))),
        }
    }

    fn append(&mut self) -> Result<Command, ParseError> {
        let mailbox = self.space_mailbox()?;
        self.space()?;

        let flags = if TokenKind::LPar == self.peek()?.kind {
            let flags = self.flag_list()?;
            self.space()?;
            flags
        } else {
            Vec::new()
        };

        let date_time =
            if TokenKind::Quoted == self.peek_in(LexMode::Data)?.kind {
                let token = self.peek_in(LexMode::Data)?;
                let text = token.text();
                let date_time = DateTime::parse_from_str(
                    text.trim_start(),
                    "%d-%b-%Y %H:%M:%S %z",
                )
                .map_err(|_| {
                    self.error(format!("invalid date-time {}", text))
                })?;
                self.shift();
                self.space()?;
                Some(date_time)
            } else {
                None
            };

        let message = self
            .expect_in(LexMode::Data, &[TokenKind::Literal])?
            .into_bytes();

        Ok(Command::Append {
            mailbox,
            flags,
            date_time,
            message,
        })
    }

    fn flag(&mut self) -> Result<String, ParseError> {
        if TokenKind::BSlash == self.peek()?.kind {
            self.shift();
            if TokenKind::Star == self.peek()?.kind {
                self.shift();
                return Ok("\\*".to_owned());
            }
            Ok(format!("\\{}", self.atom()?))
        } else {
            self.atom()
        }
    }

    fn flag_list(&mut self) -> Result<Vec<String>, ParseError> {
        self.expect(TokenKind::LPar)?;
        let mut flags = Vec::new();
        if TokenKind::RPar == self.peek()?.kind {
            self.shift();
            return Ok(flags);
        }

        flags.push(self.flag()?);
        while TokenKind::RPar != self.peek()?.kind {
            self.space()?;
            flags.push(self.flag()?);
        }
        self.shift();
        Ok(flags)
    }

    pub(super) fn sequence_set(&mut self) -> Result<SequenceSet, ParseError> {
        let start = self.lexer.position();
        let mut raw = String::new();
        loop {
            let token = self.peek()?;
            if ATOM_TOKENS.contains(&token.kind)
                || TokenKind::Star == token.kind
            {
                raw.push_str(&token.text());
                self.shift();
            } else {
                break;
            }
        }

        let invalid = || {
            ParseError::new(format!("invalid sequence set {:?}", raw), start)
        };
        if raw.is_empty() {
            return Err(invalid());
        }

        let mut items = Vec::new();
        for item in raw.split(',') {
            let mut bounds = item.splitn(2, ':');
            let first = bounds
                .next()
                .and_then(parse_seq_number)
                .ok_or_else(invalid)?;
            match bounds.next() {
                None => items.push(SeqItem::Single(first)),
                Some(second) => items.push(SeqItem::Range(
                    first,
                    parse_seq_number(second).ok_or_else(invalid)?,
                )),
            }
        }

        Ok(SequenceSet(items))
    }

    fn search(&mut self, uid: bool) -> Result<Command, ParseError> {
        self.space()?;
        let charset = if Self::is_keyword(&self.peek()?, "CHARSET") {
            self.shift();
            self.space()?;
            let charset = self.astring()?;
            self.space()?;
            Some(charset)
        } else {
            None
        };

        let query = self.search_keys(charset.as_deref())?;
        Ok(Command::Search {
            charset,
            query,
            uid,
        })
    }

    fn fetch(&mut self, uid: bool) -> Result<Command, ParseError> {
        self.space()?;
        let set = self.sequence_set()?;
        self.space()?;
        let atts = self.fetch_atts()?;
        Ok(Command::Fetch { set, atts, uid })
    }

    fn fetch_atts(&mut self) -> Result<Vec<FetchAtt>, ParseError> {
        let token = self.peek()?;
        if TokenKind::LPar == token.kind {
            self.shift();
            let mut atts = vec![self.fetch_att()?];
            while TokenKind::RPar != self.peek()?.kind {
                self.space()?;
                atts.push(self.fetch_att()?);
            }
            self.shift();
            return Ok(atts);
        }

        let fast = vec![
            FetchAtt::Flags,
            FetchAtt::InternalDate,
            FetchAtt::Rfc822Size,
        ];
        if Self::is_keyword(&token, "ALL") {
            self.shift();
            let mut atts = fast;
            atts.push(FetchAtt::Envelope);
            Ok(atts)
        } else if Self::is_keyword(&token, "FAST") {
            self.shift();
            Ok(fast)
        } else if Self::is_keyword(&token, "FULL") {
            self.shift();
            let mut atts = fast;
            atts.push(FetchAtt::Envelope);
            atts.push(FetchAtt::Body);
            Ok(atts)
        } else {
            Ok(vec![self.fetch_att()?])
        }
    }

    fn fetch_att(&mut self) -> Result<FetchAtt, ParseError> {
        let name = self.expect(TokenKind::Atom)?.text().to_ascii_uppercase();
        match &name[..] {
            "ENVELOPE" => Ok(FetchAtt::Envelope),
            "FLAGS" => Ok(FetchAtt::Flags),
            "INTERNALDATE" => Ok(FetchAtt::InternalDate),
            "RFC822" => Ok(FetchAtt::Rfc822),
            "RFC822.HEADER" => Ok(FetchAtt::Rfc822Header),
            "RFC822.SIZE" => Ok(FetchAtt::Rfc822Size),
            "RFC822.TEXT" => Ok(FetchAtt::Rfc822Text),
            "BODYSTRUCTURE" => Ok(FetchAtt::BodyStructure),
            "UID" => Ok(FetchAtt::Uid),
            "BODY" if TokenKind::LBra != self.peek()?.kind => {
                Ok(FetchAtt::Body)
            },
            "BODY" | "BODY.PEEK" => {
                let section = self.section()?;
                let partial = self.partial()?;
                Ok(FetchAtt::BodySection {
                    section,
                    partial,
                    peek: "BODY.PEEK" == name,
                })
            },
            _ => Err(self.error(format!("unknown attribute `{}'", name))),
        }
    }

    fn section(&mut self) -> Result<Section, ParseError> {
        self.expect(TokenKind::LBra)?;
        if TokenKind::RBra == self.peek()?.kind {
            self.shift();
            return Ok(Section::default());
        }

        let spec = self.tokens(SECTION_TOKENS)?;
        let section = if let Some(m) = SECTION_HEADER_OR_TEXT.captures(&spec) {
            let text = if m[2].eq_ignore_ascii_case("HEADER") {
                SectionText::Header
            } else {
                SectionText::Text
            };
            Section {
                part: self.section_part(m.get(1).map(|p| p.as_str()))?,
                text: Some(text),
            }
        } else if let Some(m) = SECTION_HEADER_FIELDS.captures(&spec) {
            let part = self.section_part(m.get(1).map(|p| p.as_str()))?;
            self.space()?;
            let fields = self.header_list()?;
            Section {
                part,
                text: Some(if m.get(2).is_some() {
                    SectionText::HeaderFieldsNot(fields)
                } else {
                    SectionText::HeaderFields(fields)
                }),
            }
        } else if let Some(m) = SECTION_MIME.captures(&spec) {
            Section {
                part: self.section_part(Some(&m[1]))?,
                text: Some(SectionText::Mime),
            }
        } else if SECTION_PART.is_match(&spec) {
            Section {
                part: self.section_part(Some(&spec))?,
                text: None,
            }
        } else {
            return Err(self.error(format!("unknown section `{}'", spec)));
        };

        self.expect(TokenKind::RBra)?;
        Ok(section)
    }

    fn section_part(&self, part: Option<&str>) -> Result<Vec<u32>, ParseError> {
        let part = match part {
            None => return Ok(Vec::new()),
            Some(part) => part,
        };

        part.split('.')
            .map(|p| match p.parse::<u32>() {
                Ok(n) if n > 0 => Ok(n),
                _ => Err(self.error(format!("invalid section part {}", part))),
            })
            .collect()
    }

    fn header_list(&mut self) -> Result<Vec<String>, ParseError> {
        self.expect(TokenKind::LPar)?;
        let mut fields = vec![self.astring()?.to_ascii_uppercase()];
        while TokenKind::RPar != self.peek()?.kind {
            self.space()?;
            fields.push(self.astring()?.to_ascii_uppercase());
        }
        self.shift();
        Ok(fields)
    }

    fn partial(&mut self) -> Result<Option<Partial>, ParseError> {
        let token = self.peek()?;
        if TokenKind::Atom != token.kind {
            return Ok(None);
        }

        let text = token.text();
        let partial = match PARTIAL.captures(&text) {
            None => return Ok(None),
            Some(m) => match (m[1].parse::<u32>(), m[2].parse::<u32>()) {
                (Ok(offset), Ok(size)) => Partial { offset, size },
                _ => return Err(self.error("partial range too large")),
            },
        };
        self.shift();
        Ok(Some(partial))
    }

    fn store(&mut self, uid: bool) -> Result<Command, ParseError> {
        self.space()?;
        let set = self.sequence_set()?;
        self.space()?;
        let item = self.atom()?;
        self.space()?;

        let flags = if TokenKind::LPar == self.peek()?.kind {
            self.flag_list()?
        } else {
            let mut flags = vec![self.flag()?];
            while TokenKind::Space == self.peek()?.kind {
                self.shift();
                flags.push(self.flag()?);
            }
            flags
        };

        let m = STORE_ITEM.captures(&item).ok_or_else(|| {
            self.error(format!("unknown data item - `{}'", item))
        })?;
        let mode = match &m[1] {
            "+" => StoreMode::Add,
            "-" => StoreMode::Remove,
            _ => StoreMode::Set,
        };

        Ok(Command::Store {
            set,
            att: StoreAtt {
                mode,
                silent: m.get(2).is_some(),
                flags,
            },
            uid,
        })
    }

    fn copy(&mut self, uid: bool) -> Result<Command, ParseError> {
        self.space()?;
        let set = self.sequence_set()?;
        let mailbox = self.space_mailbox()?;
        Ok(Command::Copy { set, mailbox, uid })
    }
}

fn fold_inbox(name: String) -> String {
    if name.eq_ignore_ascii_case("INBOX") {
        "INBOX".to_owned()
    } else {
        name
    }
}

fn parse_seq_number(s: &str) -> Option<SeqNumber> {
    if "*" == s {
        Some(SeqNumber::Last)
    } else {
        match s.parse::<u64>() {
            Ok(n) if n > 0 => Some(SeqNumber::Number(n)),
            _ => None,
        }
    }
}
