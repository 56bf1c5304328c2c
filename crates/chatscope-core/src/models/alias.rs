//! Column alias families.
//!
//! Snapshots come from several exporters that disagree on column names. Each
//! family lists the accepted names in preference order; matching against a
//! schema is case-insensitive and returns the schema's own spelling.

use crate::constants::aliases;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AliasFamily {
    Timestamp,
    Sender,
    Text,
    Chat,
}

impl AliasFamily {
    pub fn names(&self) -> &'static [&'static str] {
        match self {
            Self::Timestamp => aliases::TIMESTAMP,
            Self::Sender => aliases::SENDER,
            Self::Text => aliases::TEXT,
            Self::Chat => aliases::CHAT,
        }
    }

    /// First matching column, in family preference order.
    pub fn first_in<'a>(&self, columns: &'a [String]) -> Option<&'a str> {
        self.all_in(columns).into_iter().next()
    }

    /// Every matching column, in family preference order.
    pub fn all_in<'a>(&self, columns: &'a [String]) -> Vec<&'a str> {
        self.names()
            .iter()
            .filter_map(|alias| columns.iter().find(|column| column.eq_ignore_ascii_case(alias)))
            .map(String::as_str)
            .collect()
    }
}
