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

//! The IMAP protocol engine: lexing, parsing, command execution and the
//! per-connection session loop.

pub mod command_processor;
pub mod lex;
pub mod parser;
pub mod request_reader;
pub mod response_writer;
pub mod search;
pub mod server;
pub mod syntax;
pub mod tokenizer;

#[cfg(test)]
pub mod client;
#[cfg(test)]
mod integration_tests;
