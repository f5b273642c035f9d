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

fn hello() -> Vec<u8> {
    message("hello", "hello world", "alice@example.com", "Hi there")
}

#[tokio::test]
async fn append_and_fetch() {
    let setup = set_up();
    let mut client = setup.connect("msaf");
    quick_log_in(&mut client).await;

    let data = hello();
    quick_append(&mut client, "INBOX", "", &data).await;
    let responses = ok_command!(client, "SELECT INBOX");
    assert!(has_line(&responses, "* 1 EXISTS"));

    let responses = ok_command!(client, "FETCH 1 (FLAGS UID RFC822.SIZE)");
    assert_eq!(
        vec![format!(
            "* 1 FETCH (FLAGS (INBOX) UID 1 RFC822.SIZE {})",
            data.len()
        )],
        untagged(&responses)
    );

    let responses = ok_command!(client, "FETCH 1 ENVELOPE");
    assert_line_like(&responses[0], r"^\* 1 FETCH \(ENVELOPE \(");
    assert!(responses[0].contains(r#""hello world""#));
    assert!(responses[0].contains(r#""alice" "example.com""#));

    let responses = ok_command!(client, "FETCH 1 BODY.PEEK[]<0.4>");
    assert_eq!(
        vec!["* 1 FETCH (BODY[]<0> {4}\r\nFrom)"],
        untagged(&responses)
    );
}

#[tokio::test]
async fn fetch_body_sets_seen() {
    let setup = set_up();
    let mut client = setup.connect("msfs");
    quick_log_in(&mut client).await;
    quick_append(&mut client, "INBOX", "", &hello()).await;
    quick_select(&mut client, "INBOX").await;

    let responses = ok_command!(client, "FETCH 1 BODY.PEEK[TEXT]");
    assert_eq!(
        vec!["* 1 FETCH (BODY[TEXT] {10}\r\nHi there\r\n)"],
        untagged(&responses)
    );

    let responses = ok_command!(client, "FETCH 1 BODY[TEXT]");
    assert_eq!(
        vec![concat!(
            "* 1 FETCH (BODY[TEXT] {10}\r\nHi there\r\n ",
            r"FLAGS (INBOX \Seen))"
        )],
        untagged(&responses)
    );

    // Already seen, so nothing extra this time
    let responses = ok_command!(client, "FETCH 1 (FLAGS BODY[TEXT])");
    assert_line_like(&responses[0], r"^\* 1 FETCH \(FLAGS \(INBOX \\Seen\) ");
    assert!(responses[0].ends_with("Hi there\r\n)"));
}

#[tokio::test]
async fn append_with_internal_date() {
    let setup = set_up();
    let mut client = setup.connect("msad");
    quick_log_in(&mut client).await;

    let responses = client
        .literal_command(
            r#"APPEND INBOX (\Seen) "05-Feb-2024 10:30:00 +0100""#,
            &hello(),
            "",
        )
        .await
        .unwrap();
    assert_tagged_ok(responses.last().unwrap());

    quick_select(&mut client, "INBOX").await;
    let responses = ok_command!(client, "FETCH 1 (INTERNALDATE FLAGS)");
    assert_eq!(
        vec![concat!(
            r#"* 1 FETCH (INTERNALDATE "05-Feb-2024 09:30:00 +0000" "#,
            r"FLAGS (INBOX \Seen))"
        )],
        untagged(&responses)
    );
}

#[tokio::test]
async fn append_to_missing_mailbox() {
    let setup = set_up();
    let mut client = setup.connect("msam");
    quick_log_in(&mut client).await;

    let responses = client
        .literal_command("APPEND ~nowhere ()", &hello(), "")
        .await
        .unwrap();
    assert_eq!(
        vec!["2 NO [TRYCREATE] ~nowhere doesn't exist"],
        responses
    );
}

#[tokio::test]
async fn store_flags() {
    let setup = set_up();
    let mut client = setup.connect("mssf");
    quick_log_in(&mut client).await;
    quick_append(&mut client, "INBOX", "", &hello()).await;
    quick_select(&mut client, "INBOX").await;

    let responses = ok_command!(client, r"STORE 1 +FLAGS (\Deleted)");
    assert_eq!(
        vec![r"* 1 FETCH (FLAGS (INBOX \Deleted))"],
        untagged(&responses)
    );

    let responses = ok_command!(client, r"STORE 1 -FLAGS.SILENT (\Deleted)");
    assert_eq!(1, responses.len());

    let responses = ok_command!(client, r"UID STORE 1 +FLAGS (\Seen)");
    assert_eq!(
        vec![r"* 1 FETCH (FLAGS (INBOX \Seen) UID 1)"],
        untagged(&responses)
    );

    let responses = ok_command!(client, "STORE 1 +FLAGS (~work)");
    assert_eq!(
        vec![r"* 1 FETCH (FLAGS (INBOX \Seen ~work))"],
        untagged(&responses)
    );
    let responses = ok_command!(client, r#"LIST "" "~*""#);
    assert!(has_line(&responses, r#"* LIST () "/" "~work""#));

    let responses = command!(client, r"STORE 2 +FLAGS (\Seen)");
    assert_eq!(1, responses.len());
    assert_line_like(
        &responses[0],
        "^[0-9]+ BAD Message sequence number out of range$",
    );
}

#[tokio::test]
async fn read_only_mailbox() {
    let setup = set_up();
    let mut client = setup.connect("msro");
    quick_log_in(&mut client).await;
    quick_append(&mut client, "INBOX", "", &hello()).await;
    ok_command!(client, "EXAMINE INBOX");

    let responses = command!(client, r"STORE 1 +FLAGS (\Deleted)");
    assert_line_like(&responses[0], "^[0-9]+ NO Mailbox is read-only$");
    let responses = command!(client, "EXPUNGE");
    assert_line_like(&responses[0], "^[0-9]+ NO Mailbox is read-only$");

    // Fetching the body of a read-only mailbox does not mark it seen
    let responses = ok_command!(client, "FETCH 1 (BODY[TEXT] FLAGS)");
    assert!(responses[0].ends_with(" FLAGS (INBOX))"));
}

#[tokio::test]
async fn expunge_and_close() {
    let setup = set_up();
    let mut client = setup.connect("msec");
    quick_log_in(&mut client).await;
    for ix in 0..3 {
        quick_append(
            &mut client,
            "INBOX",
            "",
            &message(&format!("ec{}", ix), "ec", "a@b.c", "x"),
        )
        .await;
    }
    quick_select(&mut client, "INBOX").await;

    ok_command!(client, r"STORE 1:2 +FLAGS.SILENT (\Deleted)");
    let responses = ok_command!(client, "EXPUNGE");
    assert_eq!(vec!["* 2 EXPUNGE", "* 1 EXPUNGE"], untagged(&responses));

    // Expunged messages are still in All Mail
    let responses = ok_command!(client, r#"STATUS "All Mail" (MESSAGES)"#);
    assert_eq!(r#"* STATUS "All Mail" (MESSAGES 3)"#, responses[0]);

    ok_command!(client, r"STORE 1 +FLAGS.SILENT (\Deleted)");
    let responses = ok_command!(client, "CLOSE");
    assert_eq!(1, responses.len());

    let responses = ok_command!(client, "STATUS INBOX (MESSAGES)");
    assert_eq!(r#"* STATUS "INBOX" (MESSAGES 0)"#, responses[0]);
}

#[tokio::test]
async fn copy_messages() {
    let setup = set_up();
    let mut client = setup.connect("mscm");
    quick_log_in(&mut client).await;
    quick_append(&mut client, "INBOX", "", &hello()).await;
    ok_command!(client, "CREATE ~work");
    quick_select(&mut client, "INBOX").await;

    ok_command!(client, "COPY 1 ~work");
    let responses = ok_command!(client, "STATUS ~work (MESSAGES)");
    assert_eq!(r#"* STATUS "~work" (MESSAGES 1)"#, responses[0]);

    let responses = command!(client, "COPY 1 ~nowhere");
    assert_line_like(
        &responses[0],
        r"^[0-9]+ NO \[TRYCREATE\] ~nowhere doesn't exist$",
    );

    // The destination is checked even when there is nothing to copy
    let responses = command!(client, "UID COPY 99 ~nowhere");
    assert_eq!(1, responses.len());
    assert_line_like(
        &responses[0],
        r"^[0-9]+ NO \[TRYCREATE\] ~nowhere doesn't exist$",
    );
}

#[tokio::test]
async fn store_is_idempotent() {
    let setup = set_up();
    let mut client = setup.connect("mssi");
    quick_log_in(&mut client).await;
    quick_append(&mut client, "INBOX", "", &hello()).await;
    quick_select(&mut client, "INBOX").await;

    let first = ok_command!(client, r"STORE 1 FLAGS (\Seen \Starred ~work)");
    let second = ok_command!(client, r"STORE 1 FLAGS (\Seen \Starred ~work)");
    let expected = r"* 1 FETCH (FLAGS (INBOX \Seen \Starred ~work))";
    assert!(has_line(&first, expected));
    assert!(has_line(&second, expected));

    let first = ok_command!(client, "FETCH 1 FLAGS");
    let second = ok_command!(client, "FETCH 1 FLAGS");
    assert_eq!(vec![expected], untagged(&first));
    assert_eq!(untagged(&first), untagged(&second));
}

#[tokio::test]
async fn uid_fetch_sparse_uids() {
    let setup = set_up();
    let mut client = setup.connect("msuf");
    quick_log_in(&mut client).await;
    // Only UIDs 5, 9 and 12 land in INBOX
    for uid in 1..=12 {
        let (mailbox, flags) = match uid {
            5 | 12 => ("INBOX", ""),
            9 => ("INBOX", r"\Seen"),
            _ => ("All Mail", ""),
        };
        quick_append(
            &mut client,
            mailbox,
            flags,
            &message(&format!("uf{}", uid), "uf", "a@b.c", "x"),
        )
        .await;
    }

    let responses = ok_command!(client, "SELECT INBOX");
    assert!(has_line(&responses, "* 3 EXISTS"));

    let responses = ok_command!(client, "UID FETCH 9 FLAGS");
    assert_eq!(
        vec![r"* 2 FETCH (UID 9 FLAGS (INBOX \Seen))"],
        untagged(&responses)
    );

    let responses = ok_command!(client, "UID FETCH 1:* (FLAGS UID)");
    assert_eq!(
        vec![
            "* 1 FETCH (FLAGS (INBOX) UID 5)",
            r"* 2 FETCH (FLAGS (INBOX \Seen) UID 9)",
            "* 3 FETCH (FLAGS (INBOX) UID 12)",
        ],
        untagged(&responses)
    );

    let responses = ok_command!(client, "UID FETCH 6:8 FLAGS");
    assert!(untagged(&responses).is_empty());
}

#[tokio::test]
async fn changes_reach_other_sessions() {
    let setup = set_up();
    let mut client1 = setup.connect("msrs1");
    let mut client2 = setup.connect("msrs2");
    quick_log_in(&mut client1).await;
    quick_log_in(&mut client2).await;
    quick_select(&mut client1, "INBOX").await;

    quick_append(&mut client2, "INBOX", "", &hello()).await;
    let responses = ok_command!(client1, "NOOP");
    assert_eq!(vec!["* 1 EXISTS"], untagged(&responses));

    quick_append(&mut client2, "INBOX", "", &message("rs2", "b", "c@d", "e"))
        .await;
    quick_select(&mut client2, "INBOX").await;
    ok_command!(client2, r"STORE 1 +FLAGS.SILENT (\Seen)");
    let responses = ok_command!(client1, "NOOP");
    assert_eq!(
        vec!["* 2 EXISTS", r"* 1 FETCH (FLAGS (INBOX \Seen))"],
        untagged(&responses)
    );

    ok_command!(client2, r"STORE 2 +FLAGS.SILENT (\Deleted)");
    ok_command!(client2, "EXPUNGE");

    // EXPUNGE must wait while the client may be using sequence numbers
    let responses = ok_command!(client1, "FETCH 1 UID");
    assert!(has_line(&responses, "* 1 FETCH (UID 1)"));
    assert!(!has_line(&responses, "* 2 EXPUNGE"));

    let responses = ok_command!(client1, "NOOP");
    assert!(has_line(&responses, "* 2 EXPUNGE"));
}
