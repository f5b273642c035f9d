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

//! The query language understood by the metadata index.
//!
//! Queries are plain data. The IMAP layer builds them from SEARCH keys and
//! mailbox names; the index evaluates them against whatever it stores,
//! through the `QueryTarget` view of a single message.

use std::cmp::Ordering;
use std::fmt;
use std::ops::{BitAnd, BitOr, Sub};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cmp {
    Eq,
    Ge,
    Gt,
    Le,
    Lt,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PropertyValue {
    Text(String),
    Number(u64),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SearchQuery {
    /// Matches every message.
    Null,
    /// Full-text term.
    Term(String),
    /// Ordered comparison of a message property against a constant.
    Property(String, Cmp, PropertyValue),
    /// Case-insensitive substring match on a textual property.
    PropertyMatch(String, String),
    /// Presence of a label or state. A leading `~` is not part of the name.
    Flag(String),
    And(Vec<SearchQuery>),
    Or(Vec<SearchQuery>),
    /// Messages matching the first query but not the second.
    AndNot(Box<SearchQuery>, Box<SearchQuery>),
}

/// What a query can ask about a single message.
pub trait QueryTarget {
    fn has_flag(&self, name: &str) -> bool;
    fn property(&self, field: &str) -> Option<PropertyValue>;
    fn contains_text(&self, term: &str) -> bool;
}

impl SearchQuery {
    pub fn flag(name: &str) -> Self {
        SearchQuery::Flag(name.trim_start_matches('~').to_owned())
    }

    pub fn property(
        field: &str,
        cmp: Cmp,
        value: PropertyValue,
    ) -> Self {
        SearchQuery::Property(field.to_owned(), cmp, value)
    }

    pub fn is_null(&self) -> bool {
        SearchQuery::Null == *self
    }

    pub fn matches(&self, target: &impl QueryTarget) -> bool {
        match *self {
            SearchQuery::Null => true,
            SearchQuery::Term(ref term) => target.contains_text(term),
            SearchQuery::Property(ref field, cmp, ref value) => target
                .property(field)
                .map_or(false, |actual| compare(&actual, value, cmp)),
            SearchQuery::PropertyMatch(ref field, ref needle) => {
                match target.property(field) {
                    Some(PropertyValue::Text(text)) => text
                        .to_lowercase()
                        .contains(&needle.to_lowercase()),
                    Some(PropertyValue::Number(n)) => {
                        n.to_string().contains(needle.as_str())
                    },
                    None => false,
                }
            },
            SearchQuery::Flag(ref name) => target.has_flag(name),
            SearchQuery::And(ref parts) => {
                parts.iter().all(|p| p.matches(target))
            },
            SearchQuery::Or(ref parts) => {
                parts.iter().any(|p| p.matches(target))
            },
            SearchQuery::AndNot(ref base, ref excluded) => {
                base.matches(target) && !excluded.matches(target)
            },
        }
    }
}

fn compare(actual: &PropertyValue, expected: &PropertyValue, cmp: Cmp) -> bool {
    let ordering = match (actual, expected) {
        (&PropertyValue::Number(a), &PropertyValue::Number(b)) => a.cmp(&b),
        (&PropertyValue::Text(ref a), &PropertyValue::Text(ref b)) => {
            a.as_str().cmp(b.as_str())
        },
        (&PropertyValue::Number(a), &PropertyValue::Text(ref b)) => {
            match b.trim().parse::<u64>() {
                Ok(b) => a.cmp(&b),
                Err(_) => return false,
            }
        },
        (&PropertyValue::Text(ref a), &PropertyValue::Number(b)) => {
            match a.trim().parse::<u64>() {
                Ok(a) => a.cmp(&b),
                Err(_) => return false,
            }
        },
    };

    match cmp {
        Cmp::Eq => Ordering::Equal == ordering,
        Cmp::Ge => Ordering::Less != ordering,
        Cmp::Gt => Ordering::Greater == ordering,
        Cmp::Le => Ordering::Greater != ordering,
        Cmp::Lt => Ordering::Less == ordering,
    }
}

impl BitAnd for SearchQuery {
    type Output = SearchQuery;

    fn bitand(self, rhs: SearchQuery) -> SearchQuery {
        match (self, rhs) {
            (SearchQuery::Null, q) | (q, SearchQuery::Null) => q,
            (SearchQuery::And(mut a), SearchQuery::And(b)) => {
                a.extend(b);
                SearchQuery::And(a)
            },
            (SearchQuery::And(mut a), q) => {
                a.push(q);
                SearchQuery::And(a)
            },
            (l, r) => SearchQuery::And(vec![l, r]),
        }
    }
}

impl BitOr for SearchQuery {
    type Output = SearchQuery;

    fn bitor(self, rhs: SearchQuery) -> SearchQuery {
        match (self, rhs) {
            (SearchQuery::Null, _) | (_, SearchQuery::Null) => {
                SearchQuery::Null
            },
            (SearchQuery::Or(mut a), q) => {
                a.push(q);
                SearchQuery::Or(a)
            },
            (l, r) => SearchQuery::Or(vec![l, r]),
        }
    }
}

impl Sub for SearchQuery {
    type Output = SearchQuery;

    fn sub(self, rhs: SearchQuery) -> SearchQuery {
        SearchQuery::AndNot(Box::new(self), Box::new(rhs))
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            PropertyValue::Text(ref s) => write!(f, "{:?}", s),
            PropertyValue::Number(n) => write!(f, "{}", n),
        }
    }
}

/// Renders the query in a compact prefix notation, for logs.
impl fmt::Display for SearchQuery {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fn list(
            f: &mut fmt::Formatter,
            op: &str,
            parts: &[SearchQuery],
        ) -> fmt::Result {
            write!(f, "({}", op)?;
            for part in parts {
                write!(f, " {}", part)?;
            }
            write!(f, ")")
        }

        match *self {
            SearchQuery::Null => write!(f, "*"),
            SearchQuery::Term(ref t) => write!(f, "{:?}", t),
            SearchQuery::Property(ref field, cmp, ref value) => {
                write!(f, "({:?} {} {})", cmp, field, value)
            },
            SearchQuery::PropertyMatch(ref field, ref value) => {
                write!(f, "(Match {} {:?})", field, value)
            },
            SearchQuery::Flag(ref name) => write!(f, "~{}", name),
            SearchQuery::And(ref parts) => list(f, "And", parts),
            SearchQuery::Or(ref parts) => list(f, "Or", parts),
            SearchQuery::AndNot(ref base, ref excluded) => {
                write!(f, "(AndNot {} {})", base, excluded)
            },
        }
    }
}
