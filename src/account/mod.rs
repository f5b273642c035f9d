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

//! The mailbox model presented to IMAP sessions.
//!
//! Everything here is shared between sessions. Per-session state (the
//! selected mailbox and the session's notification queue) lives with the
//! command processor.

use std::sync::{Mutex, MutexGuard};

pub mod cache;
pub mod mail_store;
pub mod message;
pub mod model;
pub mod notify;
pub mod special;

/// Locks `m`, carrying on with the data if another thread panicked while
/// holding it.
fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    match m.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
