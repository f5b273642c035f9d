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

async fn authenticate(client: &mut TestClient, data: &[u8]) -> String {
    client.write_raw(b"1 AUTHENTICATE PLAIN\r\n").await.unwrap();
    receive_line_like(client, r"^\+ $").await;
    let mut line = base64::encode(data).into_bytes();
    line.extend_from_slice(b"\r\n");
    client.write_raw(&line).await.unwrap();
    client.read_logical_line().await.unwrap()
}

#[tokio::test]
async fn authenticate_plain() {
    let setup = set_up();
    let mut client = setup.connect("auap");
    skip_greeting(&mut client).await;

    let response = authenticate(&mut client, b"\0azure\0hunter2").await;
    assert_eq!("1 OK AUTHENTICATE completed", response);
    ok_command!(client, "SELECT INBOX");
}

#[tokio::test]
async fn authenticate_with_matching_authorisation_id() {
    let setup = set_up();
    let mut client = setup.connect("auma");
    skip_greeting(&mut client).await;

    let response = authenticate(&mut client, b"azure\0azure\0hunter2").await;
    assert_eq!("1 OK AUTHENTICATE completed", response);
}

#[tokio::test]
async fn authenticate_failures() {
    let setup = set_up();
    let mut client = setup.connect("auaf");
    skip_greeting(&mut client).await;

    let response = authenticate(&mut client, b"\0azure\0wrong").await;
    assert_eq!("1 NO AUTHENTICATE failed", response);

    let response = authenticate(&mut client, b"root\0azure\0hunter2").await;
    assert_eq!("1 NO AUTHENTICATE failed", response);

    client.write_raw(b"1 AUTHENTICATE PLAIN\r\n").await.unwrap();
    receive_line_like(&mut client, r"^\+ $").await;
    client.write_raw(b"not base64!\r\n").await.unwrap();
    receive_line_like(&mut client, "^1 BAD AUTHENTICATE failed - bad base64")
        .await;

    // Still not logged in
    let responses = command!(client, "SELECT INBOX");
    assert_tagged_bad(&responses[0]);
}

#[tokio::test]
async fn authenticate_cancelled() {
    let setup = set_up();
    let mut client = setup.connect("auac");
    skip_greeting(&mut client).await;

    client.write_raw(b"1 AUTHENTICATE PLAIN\r\n").await.unwrap();
    receive_line_like(&mut client, r"^\+ $").await;
    client.write_raw(b"*\r\n").await.unwrap();
    receive_line_like(&mut client, "^1 BAD AUTHENTICATE cancelled$").await;
}

#[tokio::test]
async fn authenticate_unsupported_mechanism() {
    let setup = set_up();
    let mut client = setup.connect("auum");
    skip_greeting(&mut client).await;

    let responses = command!(client, "AUTHENTICATE CRAM-MD5");
    assert_eq!(1, responses.len());
    assert_line_like(
        &responses[0],
        "^1 NO AUTHENTICATE failed - unsupported authentication mechanism",
    );
    ok_command!(client, "LOGIN azure hunter2");
}
