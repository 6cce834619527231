use std::fmt;

use chrono::{FixedOffset, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ConvError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Bank,
    #[default]
    Credit,
}

/// Fixed-offset timezone parsed from a POSIX-style spec such as `JST-9`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Timezone {
    pub name: String,
    /// Seconds east of UTC.
    pub offset_secs: i32,
}

impl Timezone {
    pub fn new(name: &str, offset_secs: i32) -> Self {
        Self {
            name: name.to_string(),
            offset_secs,
        }
    }

    /// POSIX offsets are negative east of Greenwich, so `JST-9` is UTC+9.
    pub fn parse(spec: &str) -> Result<Self> {
        let spec = spec.trim();
        let pos = spec
            .find('+')
            .or_else(|| spec.find('-'))
            .ok_or_else(|| ConvError::InvalidTimezone(spec.to_string()))?;
        let hours: i32 = spec[pos..]
            .parse()
            .map_err(|_| ConvError::InvalidTimezone(spec.to_string()))?;
        if !(-24..=24).contains(&hours) {
            return Err(ConvError::InvalidTimezone(spec.to_string()));
        }
        Ok(Self::new(&spec[..pos].to_uppercase(), -hours * 3600))
    }

    pub fn fixed_offset(&self) -> Option<FixedOffset> {
        FixedOffset::east_opt(self.offset_secs)
    }

    pub fn offset_hours(&self) -> f64 {
        f64::from(self.offset_secs) / 3600.0
    }

    /// Wall-clock time in this zone.
    pub fn now(&self) -> NaiveDateTime {
        match self.fixed_offset() {
            Some(offset) => Utc::now().with_timezone(&offset).naive_local(),
            None => Utc::now().naive_utc(),
        }
    }
}

impl fmt::Display for Timezone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:+}", self.name, -self.offset_secs / 3600)
    }
}

/// One statement line.
#[allow(dead_code)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub date: NaiveDate,
    pub tzinfo: Option<Timezone>,
    pub description: String,
    /// Positive increases an asset or decreases a debt.
    pub amount: i64,
    pub memo: String,
    pub fitid: u64,
    pub category: String,
    pub tags: Vec<String>,
    pub account: String,
    /// `-`, `C` (cleared) or `R` (reconciled).
    pub status: String,
}

impl Transaction {
    pub fn new(date: NaiveDate, description: &str, amount: i64) -> Self {
        Self {
            date,
            tzinfo: None,
            description: description.to_string(),
            amount,
            memo: String::new(),
            fitid: 0,
            category: "unknown".to_string(),
            tags: Vec::new(),
            account: "unknown".to_string(),
            status: "-".to_string(),
        }
    }

    pub fn posted_at(&self) -> NaiveDateTime {
        self.date.and_time(chrono::NaiveTime::MIN)
    }
}

/// Non-fatal finding recorded while reading a statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    AmbiguousCharge {
        date: NaiveDate,
        amount: i64,
        matches: usize,
    },
    BadDate {
        row: usize,
        value: String,
        fallback: Option<NaiveDate>,
    },
    SkippedRow {
        row: usize,
        reason: String,
    },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AmbiguousCharge {
                date,
                amount,
                matches,
            } => {
                let what = if *matches == 0 { "no" } else { "multiple" };
                write!(
                    f,
                    "{what} card charges found for date={date}, amount={amount}"
                )
            }
            Self::BadDate {
                row,
                value,
                fallback: Some(prev),
            } => write!(f, "row {row}: illegal date {value:?}, using {prev}"),
            Self::BadDate { row, value, .. } => {
                write!(f, "row {row}: illegal date {value:?}, row skipped")
            }
            Self::SkippedRow { row, reason } => write!(f, "row {row}: skipped ({reason})"),
        }
    }
}
