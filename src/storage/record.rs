//! Records, Patches and Filters
//!
//! A [`Record`] is the only value type twinkv stores. Its identity is its
//! `key`: two records with the same key are the same entry as far as the
//! engines are concerned, whatever their other fields say.
//!
//! [`RecordPatch`] and [`RecordFilter`] carry optional fields. An unset field
//! means "leave unchanged" for a patch and "ignore" for a filter, so a year of
//! `0` or a coin count of `-1` is a real value here, not a sentinel.

use bytes::{BufMut, BytesMut};
use std::cmp::Ordering;
use std::fmt;

/// A stored entry.
#[derive(Debug, Clone, Default)]
pub struct Record {
    pub key: String,
    pub last_name: String,
    pub first_name: String,
    pub year_of_birth: i32,
    pub city: String,
    pub coins: i64,
}

impl Record {
    /// Creates a record from its six fields.
    pub fn new(
        key: impl Into<String>,
        last_name: impl Into<String>,
        first_name: impl Into<String>,
        year_of_birth: i32,
        city: impl Into<String>,
        coins: i64,
    ) -> Self {
        Self {
            key: key.into(),
            last_name: last_name.into(),
            first_name: first_name.into(),
            year_of_birth,
            city: city.into(),
            coins,
        }
    }

    /// Parses one line of the dump format:
    /// `key last_name first_name year_of_birth city coins`.
    ///
    /// Returns `None` for a blank line. Fields are not validated: a missing
    /// text field becomes an empty string and a missing or non-numeric number
    /// becomes `0`.
    pub fn parse_line(line: &str) -> Option<Self> {
        let mut fields = line.split_whitespace();
        let key = fields.next()?;

        let mut text = || fields.next().unwrap_or_default().to_string();
        let last_name = text();
        let first_name = text();
        let year_of_birth = text().parse().unwrap_or_default();
        let city = text();
        let coins = text().parse().unwrap_or_default();

        Some(Self {
            key: key.to_string(),
            last_name,
            first_name,
            year_of_birth,
            city,
            coins,
        })
    }

    /// Appends this record as one dump line, newline included.
    pub fn write_line(&self, buf: &mut BytesMut) {
        let line = format!(
            "{} {} {} {} {} {}\n",
            self.key, self.last_name, self.first_name, self.year_of_birth, self.city, self.coins
        );
        buf.put_slice(line.as_bytes());
    }

    /// Applies every set field of `patch` to this record.
    pub fn apply(&mut self, patch: &RecordPatch) {
        if let Some(last_name) = &patch.last_name {
            self.last_name.clone_from(last_name);
        }
        if let Some(first_name) = &patch.first_name {
            self.first_name.clone_from(first_name);
        }
        if let Some(year) = patch.year_of_birth {
            self.year_of_birth = year;
        }
        if let Some(city) = &patch.city {
            self.city.clone_from(city);
        }
        if let Some(coins) = patch.coins {
            self.coins = coins;
        }
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for Record {}

impl PartialOrd for Record {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Record {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}\t{}",
            self.key, self.last_name, self.first_name, self.year_of_birth, self.city, self.coins
        )
    }
}

/// Field overrides for `update`. Unset fields are left as they are.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordPatch {
    pub last_name: Option<String>,
    pub first_name: Option<String>,
    pub year_of_birth: Option<i32>,
    pub city: Option<String>,
    pub coins: Option<i64>,
}

impl RecordPatch {
    /// Returns true if the patch would change nothing.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Field filters for `find`. Unset fields match every record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    pub last_name: Option<String>,
    pub first_name: Option<String>,
    pub year_of_birth: Option<i32>,
    pub city: Option<String>,
    pub coins: Option<i64>,
}

impl RecordFilter {
    /// A filter that matches everything.
    pub fn any() -> Self {
        Self::default()
    }

    /// Builds a filter from the legacy sentinel convention, where an empty
    /// string, a year of `0` and a coin count of `-1` mean "ignore".
    ///
    /// This convention cannot express "born in year 0" or "has -1 coins";
    /// build the filter field by field when those values matter.
    pub fn from_sentinels(
        last_name: &str,
        first_name: &str,
        year_of_birth: i32,
        city: &str,
        coins: i64,
    ) -> Self {
        let text = |s: &str| (!s.is_empty()).then(|| s.to_string());
        Self {
            last_name: text(last_name),
            first_name: text(first_name),
            year_of_birth: (year_of_birth != 0).then_some(year_of_birth),
            city: text(city),
            coins: (coins != -1).then_some(coins),
        }
    }

    pub fn last_name(mut self, last_name: impl Into<String>) -> Self {
        self.last_name = Some(last_name.into());
        self
    }

    pub fn first_name(mut self, first_name: impl Into<String>) -> Self {
        self.first_name = Some(first_name.into());
        self
    }

    pub fn year_of_birth(mut self, year: i32) -> Self {
        self.year_of_birth = Some(year);
        self
    }

    pub fn city(mut self, city: impl Into<String>) -> Self {
        self.city = Some(city.into());
        self
    }

    pub fn coins(mut self, coins: i64) -> Self {
        self.coins = Some(coins);
        self
    }

    /// Checks every set field against `record`.
    pub fn matches(&self, record: &Record) -> bool {
        self.last_name.as_ref().map_or(true, |v| *v == record.last_name)
            && self.first_name.as_ref().map_or(true, |v| *v == record.first_name)
            && self.year_of_birth.map_or(true, |v| v == record.year_of_birth)
            && self.city.as_ref().map_or(true, |v| *v == record.city)
            && self.coins.map_or(true, |v| v == record.coins)
    }
}
