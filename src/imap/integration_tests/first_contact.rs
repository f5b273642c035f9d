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

use std::time::Duration;

use super::defs::*;

#[tokio::test]
async fn greeting_goodbye() {
    let setup = set_up();
    let mut client = setup.connect("fcgg");

    receive_line_like(&mut client, r"^\* OK labelmap version [0-9.]+$").await;

    let responses = ok_command!(client, "LOGOUT");
    assert_eq!(
        vec![
            "* BYE IMAP server terminating connection",
            "1 OK LOGOUT completed"
        ],
        responses
    );
    assert!(client.read_line_raw().await.is_err());
}

#[tokio::test]
async fn request_capabilities() {
    let setup = set_up();
    let mut client = setup.connect("fcrc");
    skip_greeting(&mut client).await;

    let responses = ok_command!(client, "CAPABILITY");
    assert_eq!(2, responses.len());
    assert_eq!("* CAPABILITY IMAP4REV1 IDLE", responses[0]);
    assert_eq!("1 OK CAPABILITY completed", responses[1]);
}

#[tokio::test]
async fn commands_before_login() {
    let setup = set_up();
    let mut client = setup.connect("fcbl");
    skip_greeting(&mut client).await;

    let responses = command!(client, "SELECT INBOX");
    assert_eq!(vec!["1 BAD Command unrecognized/login please"], responses);

    let responses = command!(client, "LOGIN azure wrong");
    assert_eq!(vec!["2 NO LOGIN failed"], responses);

    let responses = command!(client, "STARTTLS");
    assert_eq!(
        vec!["3 NO STARTTLS failed - TLS is not available on this listener"],
        responses
    );

    ok_command!(client, "NOOP");
    ok_command!(client, "LOGIN azure hunter2");
    ok_command!(client, "SELECT INBOX");
}

#[tokio::test]
async fn malformed_lines() {
    let setup = set_up();
    let mut client = setup.connect("fcml");
    quick_log_in(&mut client).await;

    // An empty line is ignored entirely
    client.write_raw(b"\r\n").await.unwrap();
    let responses = ok_command!(client, "NOOP");
    assert_eq!(vec!["2 OK NOOP completed"], responses);

    client.write_raw(b"a1\r\n").await.unwrap();
    receive_line_like(&mut client, "^a1 BAD Missing command$").await;

    let responses = command!(client, "FROB");
    assert_eq!(vec!["3 BAD Command unrecognized"], responses);

    let responses = command!(client, "SELECT");
    assert_eq!(1, responses.len());
    assert_line_like(&responses[0], "^4 BAD parse error: ");

    // Nothing was selected by the bad command
    let responses = command!(client, "FETCH 1 FLAGS");
    assert_eq!(vec!["5 BAD Command unrecognized"], responses);
}

#[tokio::test]
async fn unauthenticated_timeout() {
    let setup = set_up_with(|imap| imap.non_authenticated_timeout_secs = 1);
    let mut client = setup.connect("fcut");
    skip_greeting(&mut client).await;

    receive_line_like(&mut client, r"^\* BYE Autologout; idle for too long$")
        .await;
    assert!(client.read_line_raw().await.is_err());
}

#[tokio::test]
async fn session_is_unregistered_after_logout() {
    let setup = set_up();
    let mut client = setup.connect("fcsu");
    quick_log_in(&mut client).await;
    assert_eq!(1, setup.live_sessions());

    ok_command!(client, "LOGOUT");
    assert!(client.read_line_raw().await.is_err());

    for _ in 0..100 {
        if 0 == setup.live_sessions() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("Session still registered after logout");
}
