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

use regex::Regex;
use tokio::io::{DuplexStream, ReadHalf, WriteHalf};

use crate::account::mail_store::MailStore;
use crate::account::notify::NotificationRegistry;
use crate::backend::memory::{MemoryIndex, MemoryStore};
use crate::backend::parser::HeaderParser;
use crate::imap::client::Client;
use crate::imap::command_processor::CommandProcessor;
use crate::imap::server::run_session;
use crate::support::log_prefix::LogPrefix;
use crate::support::system_config::*;

/// Runs `$cmd` and asserts that it completed with a tagged `OK`.
///
/// Evaluates to all the response lines, the tagged one last.
macro_rules! ok_command {
    ($client:expr, $cmd:expr) => {{
        let responses = $client.command($cmd).await.unwrap();
        assert_tagged_ok(responses.last().unwrap());
        responses
    }};
}

/// Runs `$cmd` and evaluates to all the response lines.
macro_rules! command {
    ($client:expr, $cmd:expr) => {
        $client.command($cmd).await.unwrap()
    };
}

pub type TestClient = Client<ReadHalf<DuplexStream>, WriteHalf<DuplexStream>>;

/// One server instance: a fresh in-memory index shared by every connection
/// made through it.
pub struct Setup {
    config: Arc<SystemConfig>,
    store: Arc<MailStore>,
    registry: Arc<NotificationRegistry>,
    next_session: AtomicU64,
}

pub fn set_up() -> Setup {
    set_up_with(|_| ())
}

pub fn set_up_with(configure: impl FnOnce(&mut ImapConfig)) -> Setup {
    crate::init_test_log();

    let mut imap = ImapConfig {
        idle_flush_interval_millis: 50,
        ..ImapConfig::default()
    };
    configure(&mut imap);

    Setup {
        config: Arc::new(SystemConfig {
            imap,
            auth: AuthConfig {
                user: "azure".to_owned(),
                password: "hunter2".to_owned(),
            },
            identity: IdentityConfig::default(),
        }),
        store: Arc::new(MailStore::new(
            Arc::new(MemoryIndex::new()),
            Arc::new(MemoryStore::new()),
            Arc::new(HeaderParser),
        )),
        registry: Arc::new(NotificationRegistry::new()),
        next_session: AtomicU64::new(1),
    }
}

impl Setup {
    /// Starts a session on its own task and returns a client talking to it
    /// through an in-memory pipe.
    pub fn connect(&self, name: &'static str) -> TestClient {
        let (client_io, server_io) = tokio::io::duplex(65536);
        let processor = CommandProcessor::new(
            LogPrefix::new("imap", name.to_owned()),
            Arc::clone(&self.config),
            Arc::clone(&self.store),
            Arc::clone(&self.registry),
            self.next_session.fetch_add(1, Ordering::Relaxed),
        );
        let config = Arc::clone(&self.config);

        tokio::spawn(async move {
            let (read, write) = tokio::io::split(server_io);
            // Errors are logged by the session itself. Tests that care see
            // them as a dropped connection.
            let _ = run_session(read, write, processor, config).await;
        });

        let (read, write) = tokio::io::split(client_io);
        Client::new(read, write, name)
    }

    pub fn live_sessions(&self) -> usize {
        self.registry.len()
    }
}

pub fn assert_line_like(line: &str, pat: &str) {
    assert!(
        Regex::new(pat).unwrap().is_match(line),
        "Expected\n\
         match: {:?}\n\
         Got:   {:?}\n",
        pat,
        line
    );
}

pub async fn receive_line_like(client: &mut TestClient, pat: &str) {
    let line = client.read_logical_line().await.unwrap();
    assert_line_like(&line, pat);
}

pub async fn skip_greeting(client: &mut TestClient) {
    receive_line_like(client, r"^\* OK ").await;
}

pub async fn quick_log_in(client: &mut TestClient) {
    skip_greeting(client).await;
    ok_command!(client, "LOGIN azure hunter2");
}

pub async fn quick_select(client: &mut TestClient, mailbox: &str) {
    ok_command!(client, &format!("SELECT \"{}\"", mailbox));
}

pub async fn quick_append(
    client: &mut TestClient,
    mailbox: &str,
    flags: &str,
    message: &[u8],
) {
    let responses = client
        .literal_command(
            &format!("APPEND \"{}\" ({})", mailbox, flags),
            message,
            "",
        )
        .await
        .unwrap();
    assert_tagged_ok(responses.last().unwrap());
}

fn assert_tagged(line: &str, cond: &str) {
    assert_line_like(line, &format!(r"^[0-9]+ {}( |$)", cond));
}

pub fn assert_tagged_ok(line: &str) {
    assert_tagged(line, "OK");
}

pub fn assert_tagged_no(line: &str) {
    assert_tagged(line, "NO");
}

pub fn assert_tagged_bad(line: &str) {
    assert_tagged(line, "BAD");
}

/// Whether any of `responses` is exactly `line`.
pub fn has_line(responses: &[String], line: &str) -> bool {
    responses.iter().any(|r| r == line)
}

/// Builds a minimal message with CRLF line endings.
pub fn message(id: &str, subject: &str, from: &str, body: &str) -> Vec<u8> {
    format!(
        "From: {from}\r\n\
         To: azure@example.com\r\n\
         Subject: {subject}\r\n\
         Date: Mon, 01 Jan 2024 12:00:00 +0000\r\n\
         Message-ID: <{id}@example.com>\r\n\
         \r\n\
         {body}\r\n",
        from = from,
        subject = subject,
        id = id,
        body = body
    )
    .into_bytes()
}

/// `responses` without the final tagged response.
pub fn untagged(responses: &[String]) -> &[String] {
    &responses[..responses.len().saturating_sub(1)]
}
