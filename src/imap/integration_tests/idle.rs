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

#[tokio::test]
async fn idle_receives_new_mail() {
    let setup = set_up();
    let mut client1 = setup.connect("idnm1");
    let mut client2 = setup.connect("idnm2");
    quick_log_in(&mut client1).await;
    quick_log_in(&mut client2).await;
    quick_select(&mut client1, "INBOX").await;

    client1.write_raw(b"i1 IDLE\r\n").await.unwrap();
    receive_line_like(&mut client1, r"^\+ Waiting for DONE$").await;

    quick_append(&mut client2, "INBOX", "", &message("id", "a", "b@c", "d"))
        .await;
    receive_line_like(&mut client1, r"^\* 1 EXISTS$").await;

    client1.write_raw(b"DONE\r\n").await.unwrap();
    receive_line_like(&mut client1, "^i1 OK IDLE completed$").await;

    // Nothing left over once IDLE is done
    let responses = ok_command!(client1, "NOOP");
    assert_eq!(1, responses.len());
}

#[tokio::test]
async fn idle_rejects_other_input() {
    let setup = set_up();
    let mut client = setup.connect("idro");
    quick_log_in(&mut client).await;

    client.write_raw(b"i1 IDLE\r\n").await.unwrap();
    receive_line_like(&mut client, r"^\+ Waiting for DONE$").await;

    client.write_raw(b"i2 NOOP\r\n").await.unwrap();
    receive_line_like(&mut client, r"^\* BAD Waiting for DONE$").await;

    client.write_raw(b"done\r\n").await.unwrap();
    receive_line_like(&mut client, "^i1 OK IDLE completed$").await;
    ok_command!(client, "NOOP");
}

#[tokio::test]
async fn idle_requires_login() {
    let setup = set_up();
    let mut client = setup.connect("idrl");
    skip_greeting(&mut client).await;

    let responses = command!(client, "IDLE");
    assert_eq!(vec!["1 BAD Command unrecognized/login please"], responses);
}
