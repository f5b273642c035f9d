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

use std::io;

use lazy_static::lazy_static;
use regex::bytes::Regex;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;

use super::response_writer::OutputEvent;
use super::tokenizer::is_atom_char;

lazy_static! {
    static ref LITERAL_AT_END: Regex =
        Regex::new(r"\{([0-9]+)\}\r?\n$").unwrap();
}

/// The longest line (or line segment between literals) accepted.
pub const MAX_CMDLINE: usize = 65536;
/// The most literal data one command may carry, which bounds `APPEND`.
pub const MAX_LITERAL_TOTAL: usize = 64 * 1024 * 1024;

const READ_CHUNK: usize = 4096;

/// Manages the state of the network input.
///
/// A command line is accumulated across any literals it contains, sending
/// the continuation prompt each time one is announced, so that the parser
/// always sees the whole command at once.
pub struct RequestReader<R> {
    io: R,
    /// Data read from `io`. Everything before `consumed` belongs to the
    /// request most recently returned.
    text: Vec<u8>,
    consumed: usize,
    chunk: Box<[u8]>,
}

/// Possible outcomes of reading a command line.
#[derive(Debug, PartialEq, Eq)]
pub enum CommandStart<'a> {
    /// A complete command line including inlined literals and the final
    /// line ending.
    Complete(&'a [u8]),
    /// The command was too long but has been skipped. The value is the tag,
    /// if one could be found.
    TooLongRecovered(Option<String>),
    /// The command was too long and the input could not be resynchronised.
    TooLongFatal,
    /// A literal was announced but the continuation prompt could not be
    /// sent.
    OutputDisconnected,
}

impl<R: AsyncRead + Unpin> RequestReader<R> {
    pub fn new(io: R) -> Self {
        RequestReader {
            io,
            text: Vec::with_capacity(READ_CHUNK),
            consumed: 0,
            chunk: vec![0u8; READ_CHUNK].into_boxed_slice(),
        }
    }

    /// Reads the next command line.
    ///
    /// `send_output` is used to send the continuation prompt for literals.
    ///
    /// If `recover_overlong` is false, a line which overflows `MAX_CMDLINE`
    /// is fatal; otherwise it is skipped and the client told `NO`.
    pub async fn read_command(
        &mut self,
        send_output: &mut mpsc::Sender<OutputEvent>,
        recover_overlong: bool,
    ) -> io::Result<CommandStart<'_>> {
        self.drop_consumed();
        let mut literal_total = 0usize;

        loop {
            let line_start = self.consumed;
            if !self.consume_line().await? {
                let tag = tag_of(&self.text);
                if !recover_overlong {
                    return Ok(CommandStart::TooLongFatal);
                }

                self.skip_line().await?;
                return Ok(CommandStart::TooLongRecovered(tag));
            }

            let line = &self.text[line_start..self.consumed];
            let length = match literal_length(line) {
                None => break,
                Some(length) => length,
            };

            literal_total = literal_total.saturating_add(length);
            if literal_total > MAX_LITERAL_TOTAL {
                // The client waits for the prompt before sending the
                // literal, so the command ends here.
                return Ok(CommandStart::TooLongRecovered(tag_of(&self.text)));
            }

            if send_output
                .send(OutputEvent::ContinuationLine {
                    prompt: "Ready for additional command text",
                })
                .await
                .is_err()
            {
                return Ok(CommandStart::OutputDisconnected);
            }

            self.consume_exact(length).await?;
        }

        Ok(CommandStart::Complete(&self.text[..self.consumed]))
    }

    /// Reads a single line without interpreting it, e.g. the response to an
    /// `AUTHENTICATE` challenge or the `DONE` which ends `IDLE`.
    ///
    /// The line ending is removed. Returns `None` if the line was too long;
    /// it has been skipped in that case.
    pub async fn read_raw_line(&mut self) -> io::Result<Option<&[u8]>> {
        self.drop_consumed();
        if !self.consume_line().await? {
            self.skip_line().await?;
            return Ok(None);
        }

        let mut line = &self.text[..self.consumed - 1];
        if Some(&b'\r') == line.last() {
            line = &line[..line.len() - 1];
        }
        Ok(Some(line))
    }

    /// Advances `consumed` past the next line ending.
    ///
    /// Returns false, with `consumed` unchanged, if no line ending occurs
    /// within `MAX_CMDLINE` bytes.
    async fn consume_line(&mut self) -> io::Result<bool> {
        let mut searched = self.consumed;
        loop {
            if let Some(nl) =
                memchr::memchr(b'\n', &self.text[searched..])
            {
                self.consumed = searched + nl + 1;
                return Ok(true);
            }

            searched = self.text.len();
            if searched - self.consumed >= MAX_CMDLINE {
                return Ok(false);
            }

            self.grow_text().await?;
        }
    }

    /// Advances `consumed` by exactly `n` bytes.
    async fn consume_exact(&mut self, n: usize) -> io::Result<()> {
        let target = self.consumed + n;
        while self.text.len() < target {
            self.grow_text().await?;
        }

        self.consumed = target;
        Ok(())
    }

    /// Discards input through the end of the current line.
    async fn skip_line(&mut self) -> io::Result<()> {
        loop {
            self.drop_consumed();
            if let Some(nl) = memchr::memchr(b'\n', &self.text) {
                self.consumed = nl + 1;
                return Ok(());
            }

            self.consumed = self.text.len();
            self.drop_consumed();
            self.grow_text().await?;
        }
    }

    /// Removes all text marked as consumed from the text buffer.
    fn drop_consumed(&mut self) {
        self.text.drain(..self.consumed);
        self.consumed = 0;
    }

    /// Performs a non-empty read into `text`.
    async fn grow_text(&mut self) -> io::Result<()> {
        let nread = self.io.read(&mut self.chunk[..]).await?;
        if 0 == nread {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }

        self.text.extend_from_slice(&self.chunk[..nread]);
        Ok(())
    }
}

/// If `line` ends with a literal announcement, returns its length.
fn literal_length(line: &[u8]) -> Option<usize> {
    LITERAL_AT_END
        .captures(line)
        .and_then(|c| std::str::from_utf8(&c[1]).ok()?.parse().ok())
}

/// Extracts the tag from the start of a command line, if it has one.
fn tag_of(line: &[u8]) -> Option<String> {
    let end = line
        .iter()
        .position(|&b| !is_atom_char(b))
        .unwrap_or(line.len());
    if 0 == end {
        return None;
    }

    String::from_utf8(line[..end].to_vec()).ok()
}

#[cfg(test)]
mod test {
    use super::*;

    async fn read_all(
        input: &[u8],
        recover_overlong: bool,
    ) -> (Vec<Result<String, String>>, usize) {
        let (mut tx, mut rx) = mpsc::channel(16);
        let mut reader = RequestReader::new(input);
        let mut results = Vec::new();

        loop {
            match reader.read_command(&mut tx, recover_overlong).await {
                Ok(CommandStart::Complete(line)) => results
                    .push(Ok(String::from_utf8_lossy(line).into_owned())),
                Ok(other) => results.push(Err(format!("{:?}", other))),
                Err(e) => {
                    assert_eq!(io::ErrorKind::UnexpectedEof, e.kind());
                    break;
                },
            }
        }

        drop(tx);
        let mut prompts = 0;
        while let Some(evt) = rx.recv().await {
            if let OutputEvent::ContinuationLine { .. } = evt {
                prompts += 1;
            }
        }

        (results, prompts)
    }

    #[tokio::test]
    async fn simple_lines() {
        let (results, prompts) =
            read_all(b"a NOOP\r\nb CAPABILITY\n", true).await;
        assert_eq!(
            vec![
                Ok("a NOOP\r\n".to_owned()),
                Ok("b CAPABILITY\n".to_owned()),
            ],
            results
        );
        assert_eq!(0, prompts);
    }

    #[tokio::test]
    async fn literals_are_inlined() {
        let (results, prompts) = read_all(
            b"a LOGIN {5}\r\nazure {7}\r\nhunter2\r\nb NOOP\r\n",
            true,
        )
        .await;
        assert_eq!(
            vec![
                Ok("a LOGIN {5}\r\nazure {7}\r\nhunter2\r\n".to_owned()),
                Ok("b NOOP\r\n".to_owned()),
            ],
            results
        );
        assert_eq!(2, prompts);
    }

    #[tokio::test]
    async fn overlong_lines() {
        let mut input = b"tag ".to_vec();
        input.extend(std::iter::repeat(b'x').take(MAX_CMDLINE + 10));
        input.extend_from_slice(b"\r\nb NOOP\r\n");

        let (results, _) = read_all(&input, true).await;
        assert_eq!(
            vec![
                Err("TooLongRecovered(Some(\"tag\"))".to_owned()),
                Ok("b NOOP\r\n".to_owned()),
            ],
            results
        );

        let (results, _) = read_all(&input, false).await;
        assert_eq!("Err(\"TooLongFatal\")", format!("{:?}", results[0]));
    }

    #[tokio::test]
    async fn oversized_literal_is_refused() {
        let input = format!("a APPEND x {{{}}}\r\nb NOOP\r\n", usize::MAX);
        let (results, prompts) = read_all(input.as_bytes(), true).await;
        assert_eq!(0, prompts);
        assert_eq!(
            vec![
                Err("TooLongRecovered(Some(\"a\"))".to_owned()),
                Ok("b NOOP\r\n".to_owned()),
            ],
            results
        );
    }

    #[tokio::test]
    async fn raw_lines() {
        let mut reader = RequestReader::new(&b"DONE\r\nxyz\n"[..]);
        assert_eq!(
            Some(&b"DONE"[..]),
            reader.read_raw_line().await.unwrap()
        );
        assert_eq!(Some(&b"xyz"[..]), reader.read_raw_line().await.unwrap());
    }
}
