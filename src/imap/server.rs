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
use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

use super::command_processor::CommandProcessor;
use super::parser::ConnectionState;
use super::request_reader::{CommandStart, RequestReader};
use super::response_writer::{
    write_responses, OutputControl, OutputDisconnect, OutputEvent,
};
use super::syntax as s;
use crate::account::notify::Outbox;
use crate::support::{error::Error, system_config::SystemConfig};

/// How many output events may be queued before the session blocks.
const OUTPUT_BUFFER: usize = 64;

/// Runs one IMAP session over the given streams until the client logs out,
/// disconnects, or times out.
pub async fn run_session(
    read: impl AsyncRead + Unpin,
    write: impl AsyncWrite + Unpin,
    processor: CommandProcessor,
    config: Arc<SystemConfig>,
) -> Result<(), Error> {
    let log_prefix = processor.log_prefix().clone();
    let (output, outputs) = mpsc::channel(OUTPUT_BUFFER);
    let mut server = Server {
        reader: RequestReader::new(read),
        output,
        processor,
        config,
        sent_bye: false,
    };

    let (result, written) = tokio::join!(
        async move {
            let result = server.run().await;
            // Dropping the server closes the output channel, which lets the
            // writer finish.
            drop(server);
            result
        },
        write_responses(write, outputs),
    );

    match written {
        Ok(OutputDisconnect::ByControl) | Ok(OutputDisconnect::InputClosed) => {
        },
        Err(e) => warn!("{} Write failed: {}", log_prefix, e),
    }

    match result {
        Err(Error::Io(ref e)) if io::ErrorKind::UnexpectedEof == e.kind() => {
            info!("{} Connection closed by client", log_prefix);
            Ok(())
        },
        Err(e) => {
            warn!("{} Session failed: {}", log_prefix, e);
            Err(e)
        },
        Ok(()) => {
            info!("{} Session ended", log_prefix);
            Ok(())
        },
    }
}

/// What to do with the text the reader produced.
enum Next {
    Parsed(Result<s::CommandLine, s::ParseError>),
    TooLong(Option<String>),
    Fatal,
}

struct Server<R> {
    reader: RequestReader<R>,
    output: mpsc::Sender<OutputEvent>,
    processor: CommandProcessor,
    config: Arc<SystemConfig>,
    sent_bye: bool,
}

impl<R: AsyncRead + Unpin> Server<R> {
    /// Runs the command loop until an error occurs or a `BYE` response has
    /// been sent.
    async fn run(&mut self) -> Result<(), Error> {
        let greeting = self.processor.greet();
        self.send_response(greeting, OutputControl::Flush).await?;

        while !self.sent_bye && !self.processor.logged_out() {
            let recover_overlong =
                ConnectionState::NotAuthenticated != self.processor.state();
            let read = tokio::time::timeout(
                self.read_timeout(),
                self.reader.read_command(&mut self.output, recover_overlong),
            )
            .await;

            let next = match read {
                Err(_) => {
                    self.autologout().await?;
                    break;
                },
                Ok(read) => match read? {
                    CommandStart::Complete(line) => {
                        Next::Parsed(self.processor.parse(line))
                    },
                    CommandStart::TooLongRecovered(tag) => Next::TooLong(tag),
                    CommandStart::TooLongFatal => Next::Fatal,
                    CommandStart::OutputDisconnected => break,
                },
            };

            let parsed = match next {
                Next::Parsed(parsed) => parsed,
                Next::TooLong(tag) => {
                    let response = s::ResponseLine {
                        tag,
                        response: s::Response::cond(
                            s::RespCondType::No,
                            None,
                            "Command line too long",
                        ),
                    };
                    self.send_response(response, OutputControl::Flush)
                        .await?;
                    continue;
                },
                Next::Fatal => {
                    self.send_bye("Command line too long").await?;
                    break;
                },
            };

            let s::CommandLine { tag, name, cmd } = match parsed {
                Ok(command_line) => command_line,
                Err(e) => {
                    let response = self.processor.parse_error(e);
                    self.send_response(response, OutputControl::Flush)
                        .await?;
                    continue;
                },
            };

            match cmd {
                s::Command::Authenticate { mechanism } => {
                    self.handle_authenticate(tag, &mechanism).await?
                },
                s::Command::Idle => self.handle_idle(tag).await?,
                s::Command::Null => (),
                cmd => {
                    self.handle_command(s::CommandLine { tag, name, cmd })
                        .await?
                },
            }
        }

        Ok(())
    }

    fn read_timeout(&self) -> Duration {
        if ConnectionState::NotAuthenticated == self.processor.state() {
            self.config.imap.non_authenticated_timeout()
        } else {
            self.config.imap.authenticated_timeout()
        }
    }

    async fn handle_command(
        &mut self,
        command_line: s::CommandLine,
    ) -> Result<(), Error> {
        let mut untagged = Vec::new();
        let response = self
            .processor
            .handle_command(command_line, &mut |r| untagged.push(r));

        for r in untagged {
            self.send_response(
                s::ResponseLine::untagged(r),
                OutputControl::Buffer,
            )
            .await?;
        }

        let ctl = if self.processor.logged_out() {
            OutputControl::Disconnect
        } else {
            OutputControl::Flush
        };
        self.send_response(response, ctl).await
    }

    /// Handles the full `AUTHENTICATE` flow.
    async fn handle_authenticate(
        &mut self,
        tag: Option<String>,
        mechanism: &str,
    ) -> Result<(), Error> {
        if let Some(response) =
            self.processor.authenticate_start(tag.clone(), mechanism)
        {
            return self.send_response(response, OutputControl::Flush).await;
        }

        // The space after the + is mandatory; there is no challenge data.
        self.send_continuation("").await?;

        let read = tokio::time::timeout(
            self.read_timeout(),
            self.reader.read_raw_line(),
        )
        .await;
        let response = match read {
            Err(_) => return self.autologout().await,
            Ok(read) => match read? {
                Some(data) => self.processor.authenticate_finish(tag, data),
                None => s::ResponseLine {
                    tag,
                    response: s::Response::cond(
                        s::RespCondType::Bad,
                        None,
                        "AUTHENTICATE data too long",
                    ),
                },
            },
        };

        self.send_response(response, OutputControl::Flush).await
    }

    /// Handles `IDLE` until the client sends `DONE` or the session times out.
    ///
    /// While the client idles, a background task delivers notifications as
    /// they arrive and at least every `idle_flush_interval`.
    async fn handle_idle(&mut self, tag: Option<String>) -> Result<(), Error> {
        self.send_continuation("Waiting for DONE").await?;

        let (cancel, cancelled) = watch::channel(false);
        let notifier = tokio::spawn(notify_while_idle(
            self.processor.outbox(),
            self.processor.selected_mailbox().map(str::to_owned),
            self.output.clone(),
            self.config.imap.idle_flush_interval(),
            cancelled,
        ));

        let deadline =
            Instant::now() + self.config.imap.authenticated_timeout();
        let result = self.await_done(deadline).await;

        let _ = cancel.send(true);
        if let Err(e) = notifier.await {
            warn!(
                "{} IDLE notifier failed: {}",
                self.processor.log_prefix(),
                e
            );
        }

        match result {
            Ok(true) => {
                for notification in self.processor.take_notifications(false) {
                    self.send_response(
                        s::ResponseLine::untagged(notification),
                        OutputControl::Buffer,
                    )
                    .await?;
                }
                let done = self.processor.idle_done(tag);
                self.send_response(done, OutputControl::Flush).await
            },
            Ok(false) => self.autologout().await,
            Err(e) => Err(e),
        }
    }

    /// Reads lines until `DONE`, returning false if `deadline` passes
    /// first.
    async fn await_done(&mut self, deadline: Instant) -> Result<bool, Error> {
        loop {
            let line = match tokio::time::timeout_at(
                deadline,
                self.reader.read_raw_line(),
            )
            .await
            {
                Err(_) => return Ok(false),
                Ok(line) => line?,
            };

            if line.map_or(false, |l| l.eq_ignore_ascii_case(b"DONE")) {
                return Ok(true);
            }

            self.send_response(
                s::ResponseLine::untagged(s::Response::cond(
                    s::RespCondType::Bad,
                    None,
                    "Waiting for DONE",
                )),
                OutputControl::Flush,
            )
            .await?;
        }
    }

    async fn autologout(&mut self) -> Result<(), Error> {
        info!("{} Idle timeout", self.processor.log_prefix());
        self.send_bye("Autologout; idle for too long").await
    }

    async fn send_bye(&mut self, quip: &'static str) -> Result<(), Error> {
        self.send_response(
            s::ResponseLine::untagged(s::Response::cond(
                s::RespCondType::Bye,
                None,
                quip,
            )),
            OutputControl::Disconnect,
        )
        .await
    }

    async fn send_continuation(
        &mut self,
        prompt: &'static str,
    ) -> Result<(), Error> {
        self.output
            .send(OutputEvent::ContinuationLine { prompt })
            .await
            .map_err(|_| output_closed())
    }

    async fn send_response(
        &mut self,
        line: s::ResponseLine,
        ctl: OutputControl,
    ) -> Result<(), Error> {
        if let s::Response::Cond(s::CondResponse {
            cond: s::RespCondType::Bye,
            ..
        }) = line.response
        {
            self.sent_bye = true;
        }

        self.output
            .send(OutputEvent::ResponseLine { line, ctl })
            .await
            .map_err(|_| output_closed())
    }
}

fn output_closed() -> Error {
    Error::Io(io::Error::new(
        io::ErrorKind::BrokenPipe,
        "response writer has gone away",
    ))
}

/// Pushes notifications queued in `outbox` to the client until cancelled.
async fn notify_while_idle(
    outbox: Arc<Outbox>,
    mailbox: Option<String>,
    output: mpsc::Sender<OutputEvent>,
    interval: Duration,
    mut cancelled: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = cancelled.changed() => break,
            _ = outbox.changed() => (),
            _ = ticker.tick() => (),
        }

        let lines = outbox.take(mailbox.as_deref());
        if lines.is_empty() {
            continue;
        }

        for line in lines {
            let event = OutputEvent::ResponseLine {
                line: s::ResponseLine::untagged(s::Response::data(line)),
                ctl: OutputControl::Buffer,
            };
            if output.send(event).await.is_err() {
                return;
            }
        }

        if output.send(OutputEvent::Flush).await.is_err() {
            return;
        }
    }
}
