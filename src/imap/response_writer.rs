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
use std::time::{Duration, Instant};

use tokio::io::{AsyncWrite, AsyncWriteExt as _};
use tokio::sync::mpsc;

use super::{lex::LexWriter, syntax as s};

/// An event to be sent to the client.
#[derive(Debug)]
pub enum OutputEvent {
    /// A full response line.
    ResponseLine {
        /// The content to write.
        line: s::ResponseLine,
        /// Any special handling for this line.
        ctl: OutputControl,
    },
    /// A continuation line (i.e. "+ {message}\r\n").
    ContinuationLine {
        /// The prompt to send.
        prompt: &'static str,
    },
    /// Flush the buffers immediately if non-empty.
    Flush,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputControl {
    /// No special handling. Written responses may continue to be buffered.
    Buffer,
    /// Flush all internal buffers after writing this response.
    Flush,
    /// Flush all internal buffers and disconnect immediately after writing
    /// this response.
    Disconnect,
}

/// The reason `write_responses` terminated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputDisconnect {
    /// The disconnect was initiated by `OutputControl::Disconnect`.
    ByControl,
    /// The `OutputEvent` receiver was closed.
    InputClosed,
}

const TEXT_FLUSH_THRESH: usize = 4096;
const FLUSH_AGE: Duration = Duration::from_secs(3);

/// Actor for writing responses to the client.
///
/// The actor runs until one of the following:
/// - An error occurs.
/// - `outputs` is disconnected. The actor returns no error.
/// - `OutputControl::Disconnect` is processed. The actor returns no error.
pub async fn write_responses(
    mut io: impl AsyncWrite + Unpin,
    mut outputs: mpsc::Receiver<OutputEvent>,
) -> io::Result<OutputDisconnect> {
    let mut text = Vec::<u8>::with_capacity(TEXT_FLUSH_THRESH * 5 / 4);
    let mut last_flush = Instant::now();

    while let Some(evt) = outputs.recv().await {
        // Reset last_flush if there's not actually anything pending.
        if text.is_empty() {
            last_flush = Instant::now();
        }

        let ctl = match evt {
            OutputEvent::ResponseLine { line, ctl } => {
                line.write_to(&mut LexWriter::new(&mut text))?;
                text.extend_from_slice(b"\r\n");
                ctl
            },

            OutputEvent::ContinuationLine { prompt } => {
                text.extend_from_slice(b"+ ");
                text.extend_from_slice(prompt.as_bytes());
                text.extend_from_slice(b"\r\n");
                OutputControl::Flush
            },

            OutputEvent::Flush => OutputControl::Flush,
        };

        match ctl {
            OutputControl::Buffer => {
                // Commands which take a long time but produce little output
                // still get their output out eventually.
                if text.len() >= TEXT_FLUSH_THRESH
                    || last_flush.elapsed() >= FLUSH_AGE
                {
                    flush(&mut io, &mut text).await?;
                    last_flush = Instant::now();
                }
            },

            OutputControl::Flush => {
                flush(&mut io, &mut text).await?;
                last_flush = Instant::now();
            },

            OutputControl::Disconnect => {
                flush(&mut io, &mut text).await?;
                let _ = io.shutdown().await;
                return Ok(OutputDisconnect::ByControl);
            },
        }
    }

    flush(&mut io, &mut text).await?;
    Ok(OutputDisconnect::InputClosed)
}

async fn flush(
    io: &mut (impl AsyncWrite + Unpin),
    text: &mut Vec<u8>,
) -> io::Result<()> {
    if !text.is_empty() {
        io.write_all(text).await?;
        text.clear();
    }
    io.flush().await
}
