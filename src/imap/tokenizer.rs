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

//! Splits a command line into tokens.
//!
//! The same bytes lex differently depending on where the parser is in the
//! grammar, so the parser picks a `LexMode` before asking for each token.
//! Each mode has its own table of alternatives, tried in order; `NIL` and
//! numbers only match when followed by something that cannot continue an
//! atom, so they never steal a prefix of a longer atom.
//!
//! Literals are expected to be present in the buffer already: the request
//! reader has sent the continuation prompt and read the payload before the
//! line reaches us.

use std::borrow::Cow;
use std::fmt;

use nom::{
    branch::alt,
    bytes::complete::{tag, tag_no_case as kw, take, take_while, take_while1},
    character::complete::digit1,
    combinator::{map, map_res, opt},
    sequence::{delimited, terminated, tuple},
    IResult,
};

use super::syntax::ParseError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LexMode {
    /// Ordinary command syntax.
    Beg,
    /// Values embedded as data: numbers, strings, literals, lists.
    Data,
    /// Everything up to the end of the line.
    Text,
    /// A bracket, or else text.
    RText,
    /// Text up to a closing bracket.
    CText,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenKind {
    Space,
    Nil,
    Number,
    Atom,
    Quoted,
    Literal,
    LPar,
    RPar,
    BSlash,
    Star,
    LBra,
    RBra,
    Plus,
    Percent,
    Crlf,
    Eof,
    Text,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match *self {
            TokenKind::Space => "SPACE",
            TokenKind::Nil => "NIL",
            TokenKind::Number => "NUMBER",
            TokenKind::Atom => "ATOM",
            TokenKind::Quoted => "QUOTED",
            TokenKind::Literal => "LITERAL",
            TokenKind::LPar => "LPAR",
            TokenKind::RPar => "RPAR",
            TokenKind::BSlash => "BSLASH",
            TokenKind::Star => "STAR",
            TokenKind::LBra => "LBRA",
            TokenKind::RBra => "RBRA",
            TokenKind::Plus => "PLUS",
            TokenKind::Percent => "PERCENT",
            TokenKind::Crlf => "CRLF",
            TokenKind::Eof => "EOF",
            TokenKind::Text => "TEXT",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    /// The token's value: unescaped for quoted strings, the payload for
    /// literals, and the matched text otherwise.
    pub value: Cow<'a, [u8]>,
}

impl<'a> Token<'a> {
    fn new(kind: TokenKind, value: &'a [u8]) -> Self {
        Token {
            kind,
            value: Cow::Borrowed(value),
        }
    }

    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.value)
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.value.into_owned()
    }
}

/// A cursor over one command line.
#[derive(Clone, Debug)]
pub struct Lexer<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Lexer { input, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// Lexes the token at the current position without consuming it.
    ///
    /// Returns the token and the position just past it.
    pub fn peek(
        &self,
        mode: LexMode,
    ) -> Result<(Token<'a>, usize), ParseError> {
        let rest = &self.input[self.pos..];
        if rest.is_empty() {
            return Ok((Token::new(TokenKind::Eof, rest), self.pos));
        }

        let result = match mode {
            LexMode::Beg => beg_token(rest),
            LexMode::Data => data_token(rest),
            LexMode::Text => text_token(rest),
            LexMode::RText => rtext_token(rest),
            LexMode::CText => ctext_token(rest),
        };

        match result {
            Ok((remaining, token)) => {
                Ok((token, self.input.len() - remaining.len()))
            },
            Err(_) => Err(ParseError::new(
                format!(
                    "unknown token - {:?}",
                    String::from_utf8_lossy(&rest[..rest.len().min(20)])
                ),
                self.pos,
            )),
        }
    }

    /// Consumes through `end`, as returned by `peek`.
    pub fn advance(&mut self, end: usize) {
        self.pos = end.min(self.input.len());
    }

    pub fn next_token(
        &mut self,
        mode: LexMode,
    ) -> Result<Token<'a>, ParseError> {
        let (token, end) = self.peek(mode)?;
        self.advance(end);
        Ok(token)
    }
}

pub fn is_atom_char(b: u8) -> bool {
    !(b >= 0x80
        || b < 0x20
        || 0x7f == b
        || b"(){ %*\"\\[]+".contains(&b))
}

fn at_delimiter(rest: &[u8]) -> bool {
    rest.first().map_or(true, |&b| !is_atom_char(b))
}

fn reject<T>(i: &[u8]) -> IResult<&[u8], T> {
    Err(nom::Err::Error((i, nom::error::ErrorKind::Verify)))
}

fn beg_token(i: &[u8]) -> IResult<&[u8], Token<'_>> {
    alt((
        space, nil, number, atom, quoted, literal, lpar, rpar, bslash, star,
        lbra, rbra, plus, percent, crlf,
    ))(i)
}

fn data_token(i: &[u8]) -> IResult<&[u8], Token<'_>> {
    alt((space, nil, number, quoted, literal, lpar, rpar, crlf))(i)
}

fn text_token(i: &[u8]) -> IResult<&[u8], Token<'_>> {
    map(take_while(|b| !matches!(b, 0 | b'\r' | b'\n')), |v| {
        Token::new(TokenKind::Text, v)
    })(i)
}

fn rtext_token(i: &[u8]) -> IResult<&[u8], Token<'_>> {
    alt((lbra, text_token))(i)
}

fn ctext_token(i: &[u8]) -> IResult<&[u8], Token<'_>> {
    map(take_while(|b| !matches!(b, 0 | b'\r' | b'\n' | b']')), |v| {
        Token::new(TokenKind::Text, v)
    })(i)
}

fn single<'a>(
    i: &'a [u8],
    c: &'static str,
    kind: TokenKind,
) -> IResult<&'a [u8], Token<'a>> {
    map(tag(c), |v| Token::new(kind, v))(i)
}

fn space(i: &[u8]) -> IResult<&[u8], Token<'_>> {
    single(i, " ", TokenKind::Space)
}

fn lpar(i: &[u8]) -> IResult<&[u8], Token<'_>> {
    single(i, "(", TokenKind::LPar)
}

fn rpar(i: &[u8]) -> IResult<&[u8], Token<'_>> {
    single(i, ")", TokenKind::RPar)
}

fn bslash(i: &[u8]) -> IResult<&[u8], Token<'_>> {
    single(i, "\\", TokenKind::BSlash)
}

fn star(i: &[u8]) -> IResult<&[u8], Token<'_>> {
    single(i, "*", TokenKind::Star)
}

fn lbra(i: &[u8]) -> IResult<&[u8], Token<'_>> {
    single(i, "[", TokenKind::LBra)
}

fn rbra(i: &[u8]) -> IResult<&[u8], Token<'_>> {
    single(i, "]", TokenKind::RBra)
}

fn plus(i: &[u8]) -> IResult<&[u8], Token<'_>> {
    single(i, "+", TokenKind::Plus)
}

fn percent(i: &[u8]) -> IResult<&[u8], Token<'_>> {
    single(i, "%", TokenKind::Percent)
}

fn crlf(i: &[u8]) -> IResult<&[u8], Token<'_>> {
    map(alt((tag("\r\n"), tag("\n"))), |v| Token::new(TokenKind::Crlf, v))(
        i,
    )
}

fn nil(i: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (rest, v) = kw("NIL")(i)?;
    if at_delimiter(rest) {
        Ok((rest, Token::new(TokenKind::Nil, v)))
    } else {
        reject(i)
    }
}

fn number(i: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (rest, v) = digit1(i)?;
    if at_delimiter(rest) {
        Ok((rest, Token::new(TokenKind::Number, v)))
    } else {
        reject(i)
    }
}

fn atom(i: &[u8]) -> IResult<&[u8], Token<'_>> {
    map(take_while1(is_atom_char), |v| Token::new(TokenKind::Atom, v))(i)
}

fn quoted(i: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (body, _) = tag("\"")(i)?;
    let mut value = Vec::new();
    let mut ix = 0;
    while ix < body.len() {
        match body[ix] {
            b'"' => {
                return Ok((
                    &body[ix + 1..],
                    Token {
                        kind: TokenKind::Quoted,
                        value: Cow::Owned(value),
                    },
                ));
            },
            b'\\' => match body.get(ix + 1).copied() {
                Some(c @ b'"') | Some(c @ b'\\') => {
                    value.push(c);
                    ix += 2;
                },
                _ => return reject(i),
            },
            0 | b'\r' | b'\n' => return reject(i),
            c => {
                value.push(c);
                ix += 1;
            },
        }
    }

    reject(i)
}

fn literal(i: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (rest, len) = terminated(
        delimited(
            tag("{"),
            map_res(digit1, |d: &[u8]| {
                std::str::from_utf8(d)
                    .map_err(|_| ())
                    .and_then(|d| d.parse::<usize>().map_err(|_| ()))
            }),
            tag("}"),
        ),
        tuple((opt(tag("\r")), tag("\n"))),
    )(i)?;
    map(take(len), |v| Token::new(TokenKind::Literal, v))(rest)
}
