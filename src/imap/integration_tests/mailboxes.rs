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
async fn list_fresh_account() {
    let setup = set_up();
    let mut client = setup.connect("mblf");
    quick_log_in(&mut client).await;

    let responses = ok_command!(client, r#"LIST "" "*""#);
    assert_eq!(
        vec![
            r#"* LIST () "/" "All Mail""#,
            r#"* LIST () "/" "INBOX""#,
            "2 OK LIST completed",
        ],
        responses
    );

    let responses = ok_command!(client, r#"LSUB "" "%""#);
    assert_eq!(3, responses.len());
    assert_eq!(r#"* LSUB () "/" "All Mail""#, responses[0]);

    let responses = ok_command!(client, r#"LIST "" """#);
    assert_eq!(r#"* LIST (\Noselect) "/" """#, responses[0]);

    let responses = command!(client, r#"LIST "foo" "*""#);
    assert_eq!(vec!["5 NO LIST failed"], responses);
}

#[tokio::test]
async fn create_rename_delete() {
    let setup = set_up();
    let mut client = setup.connect("mbcr");
    quick_log_in(&mut client).await;

    ok_command!(client, "CREATE ~work");
    let responses = command!(client, "CREATE ~work");
    assert_eq!(vec!["3 NO ~work already exists"], responses);

    let responses = ok_command!(client, r#"LIST "" "~*""#);
    assert_eq!(
        vec![r#"* LIST () "/" "~work""#, "4 OK LIST completed"],
        responses
    );

    ok_command!(client, "RENAME ~work ~play");
    let responses = ok_command!(client, r#"LIST "" "~*""#);
    assert_eq!(r#"* LIST () "/" "~play""#, responses[0]);
    assert_eq!(2, responses.len());

    ok_command!(client, "DELETE ~play");
    let responses = ok_command!(client, r#"LIST "" "~*""#);
    assert_eq!(1, responses.len());

    let responses = command!(client, "DELETE ~play");
    assert_tagged_no(&responses[0]);
}

#[tokio::test]
async fn protected_mailboxes() {
    let setup = set_up();
    let mut client = setup.connect("mbpm");
    quick_log_in(&mut client).await;

    let responses = command!(client, "DELETE INBOX");
    assert_eq!(vec!["2 NO can't delete INBOX"], responses);
    let responses = command!(client, "RENAME inbox ~other");
    assert_eq!(vec!["3 NO can't rename INBOX"], responses);
    let responses = command!(client, r#"DELETE "All Mail""#);
    assert_eq!(vec!["4 NO Can't delete a special mailbox"], responses);
    let responses = command!(client, r#"DELETE "queries/x""#);
    assert_eq!(vec!["5 NO Can't delete a special mailbox"], responses);
    let responses = command!(client, "CREATE nonsense");
    assert_eq!(
        vec!["6 NO nonsense doesn't exist or is invalid"],
        responses
    );
}

#[tokio::test]
async fn select_and_examine() {
    let setup = set_up();
    let mut client = setup.connect("mbse");
    quick_log_in(&mut client).await;

    let responses = ok_command!(client, "SELECT INBOX");
    assert_eq!(
        vec![
            "* 0 EXISTS",
            "* 0 RECENT",
            "* OK [UIDVALIDITY 1] UIDs valid",
            "* OK [UIDNEXT 1] Predicted next UID",
            r"* FLAGS (\Answered \Flagged \Deleted \Seen \Draft)",
            concat!(
                r"* OK [PERMANENTFLAGS (\Answered \Flagged \Draft \Seen ",
                r"\Deleted \*)] Limited"
            ),
            "2 OK [READ-WRITE] SELECT completed",
        ],
        responses
    );

    let responses = ok_command!(client, r#"EXAMINE "All Mail""#);
    assert_eq!("3 OK [READ-ONLY] EXAMINE completed", responses[6]);

    // A failed SELECT leaves nothing selected
    let responses = command!(client, "SELECT ~nope");
    assert_eq!(
        vec!["4 NO Can't select ~nope : this mailbox doesn't exist"],
        responses
    );
    let responses = command!(client, "CLOSE");
    assert_eq!(vec!["5 BAD Command unrecognized"], responses);
}

#[tokio::test]
async fn select_special_kinds() {
    let setup = set_up();
    let mut client = setup.connect("mbsk");
    quick_log_in(&mut client).await;

    ok_command!(client, r#"SELECT "queries/hello""#);
    ok_command!(client, "SELECT ~starred");

    let responses = command!(client, r#"SELECT "queries/""#);
    assert_eq!(vec!["4 NO invalid query"], responses);

    ok_command!(client, "CREATE ~projects/");
    let responses = ok_command!(client, r#"LIST "" "~*""#);
    assert_eq!(r#"* LIST (\Noselect) "/" "~projects/""#, responses[0]);
    let responses = command!(client, "SELECT ~projects/");
    assert_eq!(
        vec!["7 NO Can't select ~projects/ : not a selectable mailbox"],
        responses
    );
}

#[tokio::test]
async fn status() {
    let setup = set_up();
    let mut client = setup.connect("mbst");
    quick_log_in(&mut client).await;

    quick_append(&mut client, "INBOX", "", &message("st1", "a", "b@c", "x"))
        .await;
    quick_append(
        &mut client,
        "INBOX",
        r"\Seen",
        &message("st2", "a", "b@c", "y"),
    )
    .await;

    let responses =
        ok_command!(client, "STATUS INBOX (MESSAGES UNSEEN UIDNEXT)");
    assert_eq!(
        r#"* STATUS "INBOX" (MESSAGES 2 UNSEEN 1 UIDNEXT 3)"#,
        responses[0]
    );

    let responses = command!(client, "STATUS ~nope (MESSAGES)");
    assert_tagged_no(&responses[0]);
}

#[tokio::test]
async fn empty_created_mailbox_forgotten_at_logout() {
    let setup = set_up();
    let mut client1 = setup.connect("mbef1");
    quick_log_in(&mut client1).await;
    ok_command!(client1, "CREATE ~scratch");
    ok_command!(client1, "LOGOUT");

    let mut client2 = setup.connect("mbef2");
    quick_log_in(&mut client2).await;
    let responses = ok_command!(client2, r#"LIST "" "~*""#);
    assert_eq!(1, responses.len());
}
