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

//! A minimal line-oriented IMAP client for driving the server in tests.
//!
//! Responses are handled as text; tests match them with regexes rather than
//! parsing them back into the `syntax` model.

use std::io;
use std::str;
use std::time::Duration;

use lazy_static::lazy_static;
use regex::bytes::Regex;
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt,
    BufReader,
};

lazy_static! {
    static ref LITERAL_AT_EOL: Regex =
        Regex::new(r"\{([0-9]+)\}\r\n$").unwrap();
}

/// How long to wait for the server before failing the test.
const READ_TIMEOUT: Duration = Duration::from_secs(10);

pub struct Client<R, W> {
    read: BufReader<R>,
    write: W,
    name: &'static str,
    next_tag: u64,
}

impl<R: AsyncRead + Unpin, W: AsyncWrite + Unpin> Client<R, W> {
    pub fn new(read: R, write: W, name: &'static str) -> Self {
        Client {
            read: BufReader::new(read),
            write,
            name,
            next_tag: 1,
        }
    }

    pub async fn write_raw(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.trace(">>", bytes);
        self.write.write_all(bytes).await?;
        self.write.flush().await
    }

    /// Reads one physical line, including its line ending.
    pub async fn read_line_raw(&mut self) -> io::Result<Vec<u8>> {
        let mut line = Vec::new();
        let nread = tokio::time::timeout(
            READ_TIMEOUT,
            self.read.read_until(b'\n', &mut line),
        )
        .await
        .map_err(|_| {
            io::Error::new(io::ErrorKind::TimedOut, "server went quiet")
        })??;

        if 0 == nread {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "server closed the connection",
            ));
        }

        self.trace("<<", &line);
        Ok(line)
    }

    /// Reads one response line, with any literals it contains inlined, and
    /// without the final CRLF.
    pub async fn read_logical_line(&mut self) -> io::Result<String> {
        let mut buf = Vec::new();
        loop {
            let line = self.read_line_raw().await?;
            if !line.ends_with(b"\r\n") {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "line didn't end with CRLF",
                ));
            }

            let literal_len = LITERAL_AT_EOL
                .captures(&line)
                .and_then(|cap| cap.get(1))
                .and_then(|len| str::from_utf8(len.as_bytes()).ok())
                .and_then(|len| len.parse::<usize>().ok());
            buf.extend_from_slice(&line);

            match literal_len {
                None => break,
                Some(len) => {
                    let start = buf.len();
                    buf.resize(start + len, 0);
                    tokio::time::timeout(
                        READ_TIMEOUT,
                        self.read.read_exact(&mut buf[start..]),
                    )
                    .await
                    .map_err(|_| {
                        io::Error::new(
                            io::ErrorKind::TimedOut,
                            "server went quiet inside a literal",
                        )
                    })??;
                },
            }
        }

        buf.truncate(buf.len() - 2);
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Reads lines up to and including the next tagged response.
    pub async fn read_responses_until_tagged(
        &mut self,
    ) -> io::Result<Vec<String>> {
        let mut responses = Vec::new();
        loop {
            let line = self.read_logical_line().await?;
            let done = !line.starts_with("* ") && !line.starts_with("+ ");
            responses.push(line);
            if done {
                return Ok(responses);
            }
        }
    }

    /// Sends `command` under a fresh tag and collects the responses.
    pub async fn command(&mut self, command: &str) -> io::Result<Vec<String>> {
        let tag = self.next_tag();
        self.write_raw(format!("{} {}\r\n", tag, command).as_bytes())
            .await?;
        self.read_responses_until_tagged().await
    }

    /// Sends `head` followed by `literal` as a synchronising literal, then
    /// `tail`, and collects the responses.
    pub async fn literal_command(
        &mut self,
        head: &str,
        literal: &[u8],
        tail: &str,
    ) -> io::Result<Vec<String>> {
        let tag = self.next_tag();
        self.write_raw(
            format!("{} {} {{{}}}\r\n", tag, head, literal.len()).as_bytes(),
        )
        .await?;

        let prompt = self.read_logical_line().await?;
        if !prompt.starts_with("+ ") {
            // Refused outright; the prompt is really the tagged response.
            return Ok(vec![prompt]);
        }

        let mut rest = literal.to_vec();
        rest.extend_from_slice(tail.as_bytes());
        rest.extend_from_slice(b"\r\n");
        self.write_raw(&rest).await?;
        self.read_responses_until_tagged().await
    }

    fn next_tag(&mut self) -> String {
        let tag = self.next_tag;
        self.next_tag += 1;
        tag.to_string()
    }

    fn trace(&self, direction: &str, data: &[u8]) {
        eprintln!(
            "[{}] {} {}",
            self.name,
            direction,
            String::from_utf8_lossy(data).trim_end()
        );
    }
}
