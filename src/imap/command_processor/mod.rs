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

//! Implements the IMAP commands themselves, i.e. everything which does not
//! depend on the wire format.
//!
//! As with `account`, this is split into several submodules for
//! manageability, but is best thought of as one single module.

/// Maps an `Error` to a tagged response.
///
/// The listed error kinds become a response with the given condition and
/// response code, quoting the error text. Anything else goes through
/// `catch_all_error_handling`.
macro_rules! map_error {
    ($this:expr, $name:expr) => {{
        let log_prefix = &$this.log_prefix;
        let name = $name;
        move |e| catch_all_error_handling(log_prefix, name, e)
    }};

    ($this:expr, $name:expr,
     $($($kind:ident)|+ => ($cond:ident, $code:expr),)+) => {{
        let log_prefix = &$this.log_prefix;
        let name = $name;
        move |e| match e {
            $($(Error::$kind { .. })|* => s::Response::cond(
                s::RespCondType::$cond,
                $code,
                e.to_string(),
            ),)*
            e => catch_all_error_handling(log_prefix, name, e),
        }
    }};
}

// selected! is a macro instead of a method on CommandProcessor since there is
// no way to express that it borrows only one field; as a method, the returned
// value is considered to borrow the whole `CommandProcessor`.
macro_rules! selected {
    ($this:expr) => {
        $this.selected.as_ref().ok_or_else(|| {
            s::Response::cond(
                s::RespCondType::Bad,
                None,
                "No mailbox selected",
            )
        })
    };
}

mod auth;
mod commands;
mod defs;
mod fetch;
mod flags;
mod mailboxes;
mod messages;

pub use self::defs::CommandProcessor;
