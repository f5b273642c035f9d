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

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::{error, info, warn};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;

use crate::account::mail_store::MailStore;
use crate::account::notify::NotificationRegistry;
use crate::backend::memory::{MemoryIndex, MemoryStore};
use crate::backend::parser::HeaderParser;
use crate::imap::command_processor::CommandProcessor;
use crate::imap::server::run_session;
use crate::support::log_prefix::LogPrefix;
use crate::support::system_config::SystemConfig;

// Need to use a this and not die! so that errors go to the configured log
macro_rules! fatal {
    ($ex:ident, $($stuff:tt)*) => {{
        error!($($stuff)*);
        crate::support::sysexits::$ex.exit()
    }}
}

static TOO_MANY_CONNECTIONS: &[u8] =
    b"* BYE Too many connections, try again later\r\n";

/// Accepts IMAP connections forever, running each session on its own task.
///
/// At most `max_sessions` sessions are live at once; connections beyond that
/// are refused with a `BYE`.
pub async fn imap(system_config: Arc<SystemConfig>) {
    let address = format!(
        "{}:{}",
        system_config.imap.bind, system_config.imap.port
    );
    let listener = match TcpListener::bind(&address).await {
        Ok(listener) => listener,
        Err(e) => fatal!(EX_OSERR, "Unable to listen on {}: {}", address, e),
    };
    info!("Listening on {}", address);

    let store = Arc::new(MailStore::new(
        Arc::new(MemoryIndex::new()),
        Arc::new(MemoryStore::new()),
        Arc::new(HeaderParser),
    ));
    let registry = Arc::new(NotificationRegistry::new());
    let sessions = Arc::new(Semaphore::new(system_config.imap.max_sessions));
    let next_session = AtomicU64::new(1);

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!("Failed to accept connection: {}", e);
                continue;
            },
        };

        let log_prefix = LogPrefix::new("imap", peer.to_string());
        let permit = match Arc::clone(&sessions).try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                warn!("{} Refusing connection; too many sessions", log_prefix);
                tokio::spawn(refuse(stream));
                continue;
            },
        };

        info!("{} Connection established", log_prefix);
        if let Err(e) = stream.set_nodelay(true) {
            warn!("{} Unable to set TCP_NODELAY: {}", log_prefix, e);
        }

        let processor = CommandProcessor::new(
            log_prefix,
            Arc::clone(&system_config),
            Arc::clone(&store),
            Arc::clone(&registry),
            next_session.fetch_add(1, Ordering::Relaxed),
        );
        let config = Arc::clone(&system_config);
        tokio::spawn(async move {
            let (read, write) = stream.into_split();
            // Failures have already been logged with the session's prefix.
            let _ = run_session(read, write, processor, config).await;
            drop(permit);
        });
    }
}

async fn refuse(mut stream: TcpStream) {
    if stream.write_all(TOO_MANY_CONNECTIONS).await.is_ok() {
        let _ = stream.shutdown().await;
    }
}
