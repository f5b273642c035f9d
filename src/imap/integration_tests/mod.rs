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

//! The integration tests are near "full-stack" tests which run the actual
//! session code, without test-specific modifications and with as little
//! "reaching under the covers" as possible.
//!
//! Each test builds its own in-memory index through `set_up()`, so tests do
//! not see each other's mail. Each "connection" runs the real session loop
//! on a task of its own and talks to the client over an in-memory duplex
//! pipe, which behaves enough like a socket that the tests need not worry
//! about port numbers and such.

#[macro_use]
mod defs;

mod auth;
mod first_contact;
mod idle;
mod literal;
mod mailboxes;
mod messages;
mod search;
