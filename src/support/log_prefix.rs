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

use std::fmt;
use std::sync::{Arc, Mutex};

/// Tracks text that should be included in at the start of every log statement.
///
/// Clones of a `LogPrefix` share the same underlying data, so the session's
/// background tasks pick up the user name as soon as the login completes.
#[derive(Clone)]
pub struct LogPrefix {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Clone)]
struct Inner {
    protocol: String,
    peer: String,
    user: Option<String>,
}

impl LogPrefix {
    pub fn new(protocol: &str, peer: String) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                protocol: protocol.to_owned(),
                peer: sanitise(peer),
                user: None,
            })),
        }
    }

    pub fn set_user(&self, user: String) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.user = Some(sanitise(user));
        }
    }
}

impl fmt::Display for LogPrefix {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let inner = match self.inner.lock() {
            Ok(inner) => inner,
            Err(_) => return write!(f, "?"),
        };

        write!(f, "{}:{}", inner.protocol, inner.peer)?;
        if let Some(ref user) = inner.user {
            write!(f, "[{}]", user)?;
        }

        Ok(())
    }
}

fn sanitise(mut s: String) -> String {
    s.retain(|c| !c.is_control());
    if let Some((truncate_len, _)) = s.char_indices().nth(64) {
        s.truncate(truncate_len);
    }

    s
}
