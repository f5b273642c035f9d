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

use super::defs::*;

// APPEND with synchronising literals is covered by every test that appends
// messages.
#[tokio::test]
async fn command_synchronising_literals() {
    let setup = set_up();
    let mut client = setup.connect("lics");
    skip_greeting(&mut client).await;

    client.write_raw(b"A1 LOGIN {5}\r\n").await.unwrap();
    receive_line_like(&mut client, r"^\+ ").await;
    client.write_raw(b"azure {7}\r\n").await.unwrap();
    receive_line_like(&mut client, r"^\+ ").await;
    client.write_raw(b"hunter2\r\n").await.unwrap();
    receive_line_like(&mut client, "^A1 OK LOGIN completed$").await;

    quick_select(&mut client, "INBOX").await;

    // Literal text which itself looks like a literal must not confuse the
    // server.
    client.write_raw(b"A2 SEARCH TEXT {3}\r\n").await.unwrap();
    receive_line_like(&mut client, r"^\+ ").await;
    client.write_raw(b"{3}\r\n").await.unwrap();
    let responses = client.read_responses_until_tagged().await.unwrap();
    assert_eq!(vec!["* SEARCH", "A2 OK SEARCH completed"], responses);

    ok_command!(client, "NOOP");
}

#[tokio::test]
async fn overlong_line_after_login() {
    let setup = set_up();
    let mut client = setup.connect("liol");
    quick_log_in(&mut client).await;

    let mut line = b"L1 NOOP ".to_vec();
    line.resize(70_000, b'x');
    line.extend_from_slice(b"\r\n");
    client.write_raw(&line).await.unwrap();
    receive_line_like(&mut client, "^L1 NO Command line too long$").await;

    ok_command!(client, "NOOP");
}

#[tokio::test]
async fn overlong_line_before_login() {
    let setup = set_up();
    let mut client = setup.connect("liob");
    skip_greeting(&mut client).await;

    let mut line = b"L1 LOGIN ".to_vec();
    line.resize(70_000, b'x');
    line.extend_from_slice(b"\r\n");
    // The server stops reading partway through, so the write may fail
    let _ = client.write_raw(&line).await;
    receive_line_like(&mut client, r"^\* BYE Command line too long$").await;
}

#[tokio::test]
async fn oversized_literal_is_refused() {
    let setup = set_up();
    let mut client = setup.connect("lios");
    quick_log_in(&mut client).await;

    // Refused before the continuation, so the client never sends the data
    client
        .write_raw(b"L2 APPEND INBOX () {999999999}\r\n")
        .await
        .unwrap();
    receive_line_like(&mut client, "^L2 NO Command line too long$").await;
    ok_command!(client, "NOOP");
}
