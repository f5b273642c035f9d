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

//! Compiles SEARCH keys into a `SearchQuery`.
//!
//! Keys are combined left to right: juxtaposition is AND, and `NOT` removes
//! the following key's matches from whatever has been built so far. A `NOT`
//! at the very start, or anywhere as a key of its own, is relative to the
//! selected mailbox. Keys this compiler does not know match everything.

use chrono::prelude::*;
use encoding_rs::Encoding;

use super::parser::CommandParser;
use super::syntax::{ParseError, SeqItem, SeqNumber, SequenceSet};
use super::tokenizer::TokenKind;
use crate::backend::{Cmp, PropertyValue, SearchQuery};

const KEY_TOKENS: &[TokenKind] = &[
    TokenKind::Atom,
    TokenKind::Number,
    TokenKind::Nil,
    TokenKind::Plus,
    TokenKind::Star,
];

impl CommandParser<'_, '_> {
    pub(super) fn search_keys(
        &mut self,
        charset: Option<&str>,
    ) -> Result<SearchQuery, ParseError> {
        let mut result = if self.take_not()? {
            self.ctx.mailbox_query.clone() - self.search_key(charset)?
        } else {
            SearchQuery::Null & self.search_key(charset)?
        };

        while TokenKind::Space == self.peek()?.kind {
            self.shift();
            if self.take_not()? {
                result = result - self.search_key(charset)?;
            } else {
                result = result & self.search_key(charset)?;
            }
        }

        Ok(result)
    }

    fn take_not(&mut self) -> Result<bool, ParseError> {
        if Self::is_keyword(&self.peek()?, "NOT") {
            self.shift();
            self.space()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn search_key(
        &mut self,
        charset: Option<&str>,
    ) -> Result<SearchQuery, ParseError> {
        let token = self.peek()?;
        if token
            .value
            .first()
            .map_or(false, |&b| b.is_ascii_digit() || b'*' == b)
        {
            return Err(
                self.error("sequence number search is not implemented")
            );
        }

        if TokenKind::LPar == token.kind {
            self.shift();
            let result = self.search_keys(charset)?;
            self.expect(TokenKind::RPar)?;
            return Ok(result);
        }

        let name = self.tokens(KEY_TOKENS)?.to_ascii_uppercase();
        let ctx = self.ctx;
        let mailbox = || ctx.mailbox_query.clone();
        let query = match &name[..] {
            "UID" => {
                self.space()?;
                let set = self.sequence_set()?;
                uid_query(&set, self.ctx.last_uid)
            },
            "BODY" | "TEXT" => {
                self.space()?;
                SearchQuery::Term(self.search_string(charset)?)
            },
            "HEADER" => {
                self.space()?;
                let field = self.astring()?.to_ascii_lowercase();
                self.space()?;
                let value = self.search_string(charset)?;
                match &field[..] {
                    "x-ml-name" | "x-mail-count" => SearchQuery::property(
                        &field,
                        Cmp::Eq,
                        PropertyValue::Text(value),
                    ),
                    _ => SearchQuery::PropertyMatch(field, value),
                }
            },
            "SUBJECT" | "FROM" | "TO" | "CC" | "BCC" => {
                self.space()?;
                SearchQuery::PropertyMatch(
                    name.to_ascii_lowercase(),
                    self.search_string(charset)?,
                )
            },
            "BEFORE" => self.date_key("internal-date", DateKey::Before)?,
            "ON" => self.date_key("internal-date", DateKey::On)?,
            "SINCE" => self.date_key("internal-date", DateKey::Since)?,
            "SENTBEFORE" => self.date_key("date", DateKey::Before)?,
            "SENTON" => self.date_key("date", DateKey::On)?,
            "SENTSINCE" => self.date_key("date", DateKey::Since)?,
            "LARGER" | "SMALLER" => {
                self.space()?;
                let size = self.number()?;
                SearchQuery::property(
                    "size",
                    if "LARGER" == name { Cmp::Gt } else { Cmp::Lt },
                    PropertyValue::Number(size),
                )
            },
            "ANSWERED" => SearchQuery::flag("Answered"),
            "DELETED" => SearchQuery::flag("deleted"),
            "DRAFT" => SearchQuery::flag("draft"),
            "FLAGGED" => SearchQuery::flag("Flagged"),
            "RECENT" | "NEW" => SearchQuery::flag("Recent"),
            "SEEN" => mailbox() - SearchQuery::flag("unread"),
            "UNSEEN" => SearchQuery::flag("unread"),
            "OLD" => mailbox() - SearchQuery::flag("Recent"),
            "UNANSWERED" => mailbox() - SearchQuery::flag("Answered"),
            "UNDELETED" => mailbox() - SearchQuery::flag("deleted"),
            "UNDRAFT" => mailbox() - SearchQuery::flag("draft"),
            "UNFLAGGED" => mailbox() - SearchQuery::flag("Flagged"),
            "KEYWORD" => {
                self.space()?;
                SearchQuery::flag(&self.atom()?)
            },
            "UNKEYWORD" => {
                self.space()?;
                mailbox() - SearchQuery::flag(&self.atom()?)
            },
            "OR" => {
                self.space()?;
                let left = self.search_key(charset)?;
                self.space()?;
                let right = self.search_key(charset)?;
                SearchQuery::Or(vec![left, right])
            },
            "NOT" => {
                self.space()?;
                mailbox() - self.search_key(charset)?
            },
            _ => SearchQuery::Null,
        };

        Ok(query)
    }

    /// An astring, decoded from the search charset.
    fn search_string(
        &mut self,
        charset: Option<&str>,
    ) -> Result<String, ParseError> {
        let raw = self.astring_bytes()?;
        let encoding = charset
            .and_then(|c| Encoding::for_label(c.as_bytes()))
            .unwrap_or(encoding_rs::UTF_8);
        Ok(encoding
            .decode_without_bom_handling(&raw)
            .0
            .into_owned())
    }

    fn date_key(
        &mut self,
        field: &str,
        key: DateKey,
    ) -> Result<SearchQuery, ParseError> {
        self.space()?;
        let text = self.astring()?;
        let date = NaiveDate::parse_from_str(&text, "%d-%b-%Y")
            .map_err(|_| self.error(format!("invalid date string {}", text)))?;
        let next_day = date
            .succ_opt()
            .ok_or_else(|| self.error(format!("date out of range {}", text)))?;
        let at = |d: NaiveDate| {
            PropertyValue::Text(format!("{}T00:00:00", d.format("%Y-%m-%d")))
        };

        Ok(match key {
            DateKey::Before => SearchQuery::property(field, Cmp::Lt, at(date)),
            DateKey::On => SearchQuery::And(vec![
                SearchQuery::property(field, Cmp::Ge, at(date)),
                SearchQuery::property(field, Cmp::Lt, at(next_day)),
            ]),
            // The day after the one named, not the day itself.
            DateKey::Since => {
                SearchQuery::property(field, Cmp::Ge, at(next_day))
            },
        })
    }
}

#[derive(Clone, Copy, Debug)]
enum DateKey {
    Before,
    On,
    Since,
}

fn uid_query(set: &SequenceSet, last_uid: u64) -> SearchQuery {
    let resolve = |n: SeqNumber| match n {
        SeqNumber::Number(n) => n,
        SeqNumber::Last => last_uid,
    };
    let uid = |cmp, n| {
        SearchQuery::property("uid", cmp, PropertyValue::Number(n))
    };

    set.0
        .iter()
        .map(|&item| match item {
            SeqItem::Single(n) => uid(Cmp::Eq, resolve(n)),
            SeqItem::Range(a, SeqNumber::Last)
            | SeqItem::Range(SeqNumber::Last, a) => {
                uid(Cmp::Ge, resolve(a).min(last_uid))
            },
            SeqItem::Range(a, b) => {
                let (a, b) = (resolve(a), resolve(b));
                let (lo, hi) = (a.min(b), a.max(b));
                SearchQuery::And(vec![uid(Cmp::Ge, lo), uid(Cmp::Le, hi)])
            },
        })
        .fold(None, |acc: Option<SearchQuery>, q| {
            Some(match acc {
                None => q,
                Some(acc) => acc | q,
            })
        })
        .unwrap_or(SearchQuery::Null)
}
