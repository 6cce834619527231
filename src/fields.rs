use std::collections::HashMap;

use chrono::NaiveDate;

use crate::error::{ConvError, Result};
use crate::fmt::normalize;
use crate::models::AccountType;

const DATE_FORMATS: &[&str] = &["%Y/%m/%d", "%Y-%m-%d", "%Y%m%d"];

// ---------------------------------------------------------------------------
// Column mapping
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSpec {
    pub indices: Vec<usize>,
    /// `name?`: an empty cell repeats the previous row's value.
    pub optional: bool,
}

/// Reverse lookup from field name to column positions, built from a
/// comma-separated list such as `date?,description,,amount,memo,memo`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMap {
    fields: HashMap<String, FieldSpec>,
}

impl FieldMap {
    pub fn parse(def: &str) -> Self {
        let mut fields: HashMap<String, FieldSpec> = HashMap::new();
        for (i, col) in def.split(',').enumerate() {
            let col = col.trim();
            if col.is_empty() {
                continue;
            }
            let (name, optional) = match col.strip_suffix('?') {
                Some(name) => (name.trim(), true),
                None => (col, false),
            };
            let spec = fields.entry(name.to_string()).or_default();
            spec.indices.push(i);
            spec.optional |= optional;
        }
        Self { fields }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.get(name)
    }

    pub fn indices(&self, name: &str) -> &[usize] {
        self.fields
            .get(name)
            .map(|spec| spec.indices.as_slice())
            .unwrap_or(&[])
    }
}

// ---------------------------------------------------------------------------
// Cell parsers
// ---------------------------------------------------------------------------

/// Parse `YYYY/MM/DD`, `YYYY-MM-DD` or `YYYYMMDD`, in that order.
pub fn parse_date(raw: &str) -> Result<NaiveDate> {
    let s = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .ok_or_else(|| ConvError::InvalidDate(raw.to_string()))
}

/// Error for an amount that leaves the `i64` range once signs are applied
/// or cells are combined.
pub fn amount_out_of_range(row: usize, value: impl std::fmt::Display) -> ConvError {
    ConvError::InvalidAmount {
        row,
        value: value.to_string(),
    }
}

/// Parse an integer amount. Digit-group commas are dropped; empty is zero.
pub fn parse_amount(raw: &str, row: usize) -> Result<i64> {
    let s = normalize(raw).replace(',', "");
    let s = s.trim();
    if s.is_empty() {
        return Ok(0);
    }
    s.parse().map_err(|_| ConvError::InvalidAmount {
        row,
        value: raw.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Signed amount policies
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmountPolicy {
    /// `+amount` and `-amount` columns: `|plus| - |minus|`.
    Split,
    /// One `amount` column, sign flipped on credit statements.
    Single { negate: bool },
    /// Only `-amount`, used as is. Credit statements only.
    MinusOnly,
}

impl AmountPolicy {
    pub fn select(fields: &FieldMap, account_type: AccountType) -> Result<Self> {
        if fields.contains("+amount") && fields.contains("-amount") {
            Ok(Self::Split)
        } else if fields.contains("amount") {
            Ok(Self::Single {
                negate: account_type == AccountType::Credit,
            })
        } else if fields.contains("-amount") {
            if account_type == AccountType::Credit {
                Ok(Self::MinusOnly)
            } else {
                Err(ConvError::AmountRequiresCredit)
            }
        } else {
            Err(ConvError::NoAmountField)
        }
    }

    /// `number` yields the parsed value of a named amount field on `row`.
    pub fn derive<F>(&self, row: usize, mut number: F) -> Result<i64>
    where
        F: FnMut(&str) -> Result<i64>,
    {
        match self {
            Self::Split => {
                let plus = number("+amount")?;
                let minus = number("-amount")?;
                plus.checked_abs()
                    .zip(minus.checked_abs())
                    .and_then(|(p, m)| p.checked_sub(m))
                    .ok_or_else(|| amount_out_of_range(row, format!("+{plus} -{minus}")))
            }
            Self::Single { negate: true } => {
                let value = number("amount")?;
                value
                    .checked_neg()
                    .ok_or_else(|| amount_out_of_range(row, value))
            }
            Self::Single { negate: false } => number("amount"),
            Self::MinusOnly => number("-amount"),
        }
    }
}
