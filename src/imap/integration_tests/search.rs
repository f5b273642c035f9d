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

async fn populate(client: &mut TestClient) {
    for &(id, date, subject, from, flags) in &[
        ("s1", "01-Jan-2024 12:00:00 +0000", "hello world", "alice@a.com", ""),
        ("s2", "02-Jan-2024 12:00:00 +0000", "goodbye", "bob@b.com", r"\Seen"),
        ("s3", "03-Jan-2024 12:00:00 +0000", "hello again", "bob@b.com", ""),
    ] {
        let responses = client
            .literal_command(
                &format!(r#"APPEND INBOX ({}) "{}""#, flags, date),
                &message(id, subject, from, &format!("body of {}", id)),
                "",
            )
            .await
            .unwrap();
        assert_tagged_ok(responses.last().unwrap());
    }
}

#[tokio::test]
async fn search_basics() {
    let setup = set_up();
    let mut client = setup.connect("sebs");
    quick_log_in(&mut client).await;
    populate(&mut client).await;
    quick_select(&mut client, "INBOX").await;

    macro_rules! search {
        ($query:expr, $expected:expr) => {
            let responses = ok_command!(client, $query);
            assert_eq!(vec![$expected], untagged(&responses), "{}", $query);
        };
    }

    search!("SEARCH ALL", "* SEARCH 1 2 3");
    search!("SEARCH SUBJECT hello", "* SEARCH 1 3");
    search!("SEARCH NOT SUBJECT hello", "* SEARCH 2");
    search!("SEARCH FROM bob", "* SEARCH 2 3");
    search!("SEARCH UNSEEN", "* SEARCH 1 3");
    search!("SEARCH SEEN", "* SEARCH 2");
    search!("SEARCH OR SEEN SUBJECT again", "* SEARCH 2 3");
    search!("SEARCH FROM bob NOT SEEN", "* SEARCH 3");
    search!("SEARCH SUBJECT nothing-like-this", "* SEARCH");
    search!("UID SEARCH SUBJECT hello", "* SEARCH 1 3");
}

#[tokio::test]
async fn search_dates() {
    let setup = set_up();
    let mut client = setup.connect("sedt");
    quick_log_in(&mut client).await;
    populate(&mut client).await;
    quick_select(&mut client, "INBOX").await;

    let responses = ok_command!(client, "SEARCH BEFORE 02-Jan-2024");
    assert_eq!(vec!["* SEARCH 1"], untagged(&responses));
    let responses = ok_command!(client, "SEARCH ON 02-Jan-2024");
    assert_eq!(vec!["* SEARCH 2"], untagged(&responses));
    // SINCE counts from the day after the given date
    let responses = ok_command!(client, "SEARCH SINCE 01-Jan-2024");
    assert_eq!(vec!["* SEARCH 2 3"], untagged(&responses));
}

#[tokio::test]
async fn search_sent_dates() {
    let setup = set_up();
    let mut client = setup.connect("sesd");
    quick_log_in(&mut client).await;
    for day in 1..=3 {
        let data = format!(
            "From: bob@b.com\r\n\
             Subject: day {day}\r\n\
             Date: 0{day} Jan 2024 12:00:00 +0000\r\n\
             Message-ID: <sent{day}@example.com>\r\n\
             \r\n\
             sent on day {day}\r\n",
            day = day
        );
        quick_append(&mut client, "INBOX", "", data.as_bytes()).await;
    }
    quick_select(&mut client, "INBOX").await;

    macro_rules! search {
        ($query:expr, $expected:expr) => {
            let responses = ok_command!(client, $query);
            assert_eq!(vec![$expected], untagged(&responses), "{}", $query);
        };
    }

    search!("SEARCH SENTBEFORE 02-Jan-2024", "* SEARCH 1");
    search!("SEARCH SENTON 02-Jan-2024", "* SEARCH 2");
    // Like SINCE, SENTSINCE counts from the day after the given date
    search!("SEARCH SENTSINCE 01-Jan-2024", "* SEARCH 2 3");
    search!("SEARCH SENTSINCE 02-Jan-2024", "* SEARCH 3");
    // The internal dates are all today
    search!("SEARCH BEFORE 02-Jan-2024", "* SEARCH");
}

#[tokio::test]
async fn search_uses_sequence_numbers_of_mailbox() {
    let setup = set_up();
    let mut client = setup.connect("sesn");
    quick_log_in(&mut client).await;
    quick_append(&mut client, "INBOX", "", &message("x1", "a", "a@b", "c"))
        .await;
    populate(&mut client).await;
    ok_command!(client, "CREATE ~work");

    quick_select(&mut client, "INBOX").await;
    ok_command!(client, "COPY 2:4 ~work");
    quick_select(&mut client, "~work").await;

    let responses = ok_command!(client, "SEARCH SUBJECT hello");
    assert_eq!(vec!["* SEARCH 1 3"], untagged(&responses));
    let responses = ok_command!(client, "UID SEARCH SUBJECT hello");
    assert_eq!(vec!["* SEARCH 2 4"], untagged(&responses));
}

#[tokio::test]
async fn search_charset() {
    let setup = set_up();
    let mut client = setup.connect("secs");
    quick_log_in(&mut client).await;
    populate(&mut client).await;
    quick_select(&mut client, "INBOX").await;

    let responses = ok_command!(client, "SEARCH CHARSET UTF-8 SUBJECT again");
    assert_eq!(vec!["* SEARCH 3"], untagged(&responses));

    let responses = command!(client, "SEARCH CHARSET X-NOPE SUBJECT again");
    assert_eq!(1, responses.len());
    assert_line_like(
        &responses[0],
        r"^[0-9]+ NO \[BADCHARSET\] Unsupported charset X-NOPE$",
    );
}
