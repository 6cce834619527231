use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{ConvError, Result};
use crate::fields::{amount_out_of_range, parse_amount, parse_date, AmountPolicy, FieldMap};
use crate::fmt::{collapse_spaces, normalize};
use crate::models::{AccountType, Timezone, Transaction, Warning};

/// Leading glyph of annotation-only rows on statements with a commission column.
pub const REFMARK: char = '\u{203B}';

/// What to do with a row whose date cell cannot be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnBadDate {
    #[default]
    Previous,
    Skip,
}

#[derive(Debug, Clone, Default)]
pub struct ReaderOptions {
    pub account_type: AccountType,
    pub on_bad_date: OnBadDate,
    pub tzinfo: Option<Timezone>,
}

#[derive(Debug, Default)]
pub struct RowOutcome {
    pub transaction: Option<Transaction>,
    pub warning: Option<Warning>,
}

impl RowOutcome {
    fn skipped(warning: Option<Warning>) -> Self {
        Self {
            transaction: None,
            warning,
        }
    }
}

/// Turns raw CSV rows into transactions according to a column mapping.
pub struct RowReader {
    fields: FieldMap,
    policy: AmountPolicy,
    opts: ReaderOptions,
    prev_date: Option<NaiveDate>,
    prev_cells: HashMap<String, Vec<String>>,
    next_fitid: u64,
}

impl RowReader {
    pub fn new(fields: FieldMap, opts: ReaderOptions) -> Result<Self> {
        if !fields.contains("date") {
            return Err(ConvError::Settings("column mapping has no date field".into()));
        }
        let policy = AmountPolicy::select(&fields, opts.account_type)?;
        Ok(Self {
            fields,
            policy,
            opts,
            prev_date: None,
            prev_cells: HashMap::new(),
            next_fitid: 0,
        })
    }

    /// Normalized cells mapped to `name`; missing columns read as empty.
    fn cells(&mut self, name: &str, record: &csv::StringRecord) -> Vec<String> {
        let Some(spec) = self.fields.get(name) else {
            return Vec::new();
        };
        let cells: Vec<String> = spec
            .indices
            .iter()
            .map(|&i| normalize(record.get(i).unwrap_or("")))
            .collect();
        if spec.optional {
            if cells.iter().all(|c| c.trim().is_empty()) {
                if let Some(prev) = self.prev_cells.get(name) {
                    return prev.clone();
                }
            } else {
                self.prev_cells.insert(name.to_string(), cells.clone());
            }
        }
        cells
    }

    fn text(&mut self, name: &str, record: &csv::StringRecord, sep: &str) -> String {
        self.cells(name, record)
            .into_iter()
            .filter(|c| !c.is_empty())
            .collect::<Vec<_>>()
            .join(sep)
    }

    fn number(&mut self, name: &str, record: &csv::StringRecord, row: usize) -> Result<i64> {
        let mut total: i64 = 0;
        for cell in self.cells(name, record) {
            total = total
                .checked_add(parse_amount(&cell, row)?)
                .ok_or_else(|| amount_out_of_range(row, &cell))?;
        }
        Ok(total)
    }

    /// Derive one transaction from `record`, the `row`-th data row (1-based).
    pub fn read_row(&mut self, row: usize, record: &csv::StringRecord) -> Result<RowOutcome> {
        if record.iter().all(|c| c.trim().is_empty()) {
            return Ok(RowOutcome::skipped(Some(Warning::SkippedRow {
                row,
                reason: "blank record".to_string(),
            })));
        }
        let raw_date = self
            .cells("date", record)
            .into_iter()
            .find(|c| !c.trim().is_empty())
            .unwrap_or_default();
        let mut warning = None;
        let date = match parse_date(&raw_date) {
            Ok(date) => date,
            Err(_) => {
                let fallback = match self.opts.on_bad_date {
                    OnBadDate::Previous => self.prev_date,
                    OnBadDate::Skip => None,
                };
                let bad = Warning::BadDate {
                    row,
                    value: raw_date,
                    fallback,
                };
                match fallback {
                    Some(prev) => {
                        warning = Some(bad);
                        prev
                    }
                    None => return Ok(RowOutcome::skipped(Some(bad))),
                }
            }
        };

        let description = collapse_spaces(&self.text("description", record, " "));

        let policy = self.policy;
        let mut amount = policy.derive(row, |name| self.number(name, record, row))?;

        let mut memo = collapse_spaces(&self.text("memo", record, ","));
        if !description.is_empty() {
            if let Some(rest) = memo
                .strip_prefix(description.as_str())
                .and_then(|rest| rest.strip_prefix(','))
            {
                memo = rest.to_string();
            }
        }

        if self.fields.contains("commission") {
            if description.is_empty() || description.starts_with(REFMARK) {
                return Ok(RowOutcome::skipped(None));
            }
            if amount == 0 {
                let commission = self.number("commission", record, row)?;
                amount = commission
                    .checked_neg()
                    .ok_or_else(|| amount_out_of_range(row, commission))?;
            }
        }

        let mut txn = Transaction::new(date, &description, amount);
        txn.memo = memo;
        txn.tzinfo = self.opts.tzinfo.clone();
        txn.fitid = self.next_fitid;
        self.next_fitid += 1;
        self.prev_date = Some(date);

        Ok(RowOutcome {
            transaction: Some(txn),
            warning,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(cells: &[&str]) -> csv::StringRecord {
        csv::StringRecord::from(cells.to_vec())
    }

    fn reader(def: &str, account_type: AccountType, on_bad_date: OnBadDate) -> RowReader {
        RowReader::new(
            FieldMap::parse(def),
            ReaderOptions {
                account_type,
                on_bad_date,
                tzinfo: None,
            },
        )
        .unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_credit_single_amount_is_negated() {
        let mut r = reader("date,description,amount", AccountType::Credit, OnBadDate::Previous);
        let out = r.read_row(1, &rec(&["2023/01/05", "SHOP", "1,200"])).unwrap();
        let txn = out.transaction.unwrap();
        assert_eq!(txn.date, date(2023, 1, 5));
        assert_eq!(txn.description, "SHOP");
        assert_eq!(txn.amount, -1200);
        assert!(out.warning.is_none());
    }

    #[test]
    fn test_bank_split_amount() {
        let mut r = reader("date,description,+amount,-amount", AccountType::Bank, OnBadDate::Previous);
        let deposit = r.read_row(1, &rec(&["20230105", "SALARY", "300000", ""])).unwrap();
        assert_eq!(deposit.transaction.unwrap().amount, 300000);
        let withdrawal = r.read_row(2, &rec(&["20230106", "ATM", "", "-5,000"])).unwrap();
        assert_eq!(withdrawal.transaction.unwrap().amount, -5000);
    }

    #[test]
    fn test_fitid_dense_across_skips() {
        let mut r = reader("date,description,amount", AccountType::Credit, OnBadDate::Skip);
        let rows = [
            rec(&["2023/01/05", "A", "100"]),
            rec(&["bogus", "B", "200"]),
            rec(&["2023/01/06", "C", "300"]),
            rec(&["", "D", "400"]),
            rec(&["2023/01/07", "E", "500"]),
        ];
        let ids: Vec<u64> = rows
            .iter()
            .enumerate()
            .filter_map(|(i, row)| r.read_row(i + 1, row).unwrap().transaction)
            .map(|t| t.fitid)
            .collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn test_bad_date_falls_back_to_previous_row() {
        let mut r = reader("date,description,amount", AccountType::Credit, OnBadDate::Previous);
        r.read_row(1, &rec(&["2023/01/05", "A", "100"])).unwrap();
        let out = r.read_row(2, &rec(&["--", "B", "200"])).unwrap();
        assert_eq!(out.transaction.unwrap().date, date(2023, 1, 5));
        assert_eq!(
            out.warning,
            Some(Warning::BadDate {
                row: 2,
                value: "--".to_string(),
                fallback: Some(date(2023, 1, 5)),
            })
        );
    }

    #[test]
    fn test_bad_date_on_first_row_is_skipped() {
        let mut r = reader("date,description,amount", AccountType::Credit, OnBadDate::Previous);
        let out = r.read_row(1, &rec(&["Date", "Description", ""])).unwrap();
        assert!(out.transaction.is_none());
        assert!(matches!(out.warning, Some(Warning::BadDate { fallback: None, .. })));
    }

    #[test]
    fn test_bad_date_skip_policy() {
        let mut r = reader("date,description,amount", AccountType::Credit, OnBadDate::Skip);
        r.read_row(1, &rec(&["2023/01/05", "A", "100"])).unwrap();
        let out = r.read_row(2, &rec(&["n/a", "B", "200"])).unwrap();
        assert!(out.transaction.is_none());
        assert!(out.warning.is_some());
    }

    #[test]
    fn test_optional_date_repeats_previous_cell() {
        let mut r = reader("date?,description,amount", AccountType::Bank, OnBadDate::Skip);
        r.read_row(1, &rec(&["2023/01/05", "A", "100"])).unwrap();
        let out = r.read_row(2, &rec(&["", "B", "200"])).unwrap();
        let txn = out.transaction.unwrap();
        assert_eq!(txn.date, date(2023, 1, 5));
        assert!(out.warning.is_none());
    }

    #[test]
    fn test_memo_columns_joined_and_prefix_stripped() {
        let mut r = reader("date,description,amount,memo,memo,memo", AccountType::Credit, OnBadDate::Previous);
        let out = r
            .read_row(1, &rec(&["2023/01/05", "ＳＨＯＰ  ＡＢＣ", "100", "SHOP ABC", "", "store   42"]))
            .unwrap();
        let txn = out.transaction.unwrap();
        assert_eq!(txn.description, "SHOP ABC");
        assert_eq!(txn.memo, "store 42");
    }

    #[test]
    fn test_memo_prefix_requires_comma() {
        let mut r = reader("date,description,amount,memo", AccountType::Credit, OnBadDate::Previous);
        let out = r.read_row(1, &rec(&["2023/01/05", "SHOP", "100", "SHOPPING"])).unwrap();
        assert_eq!(out.transaction.unwrap().memo, "SHOPPING");
    }

    #[test]
    fn test_commission_rows() {
        let mut r = reader("date,description,amount,commission", AccountType::Bank, OnBadDate::Previous);
        let note = r.read_row(1, &rec(&["2023/01/05", "※手数料は別途", "", ""])).unwrap();
        assert!(note.transaction.is_none());
        assert!(note.warning.is_none());
        let blank = r.read_row(2, &rec(&["2023/01/05", "", "", "110"])).unwrap();
        assert!(blank.transaction.is_none());
        let fee = r.read_row(3, &rec(&["2023/01/05", "振込手数料", "0", "220"])).unwrap();
        let fee = fee.transaction.unwrap();
        assert_eq!(fee.amount, -220);
        assert_eq!(fee.fitid, 0);
    }

    #[test]
    fn test_blank_record_skipped_without_fitid() {
        let mut r = reader("date,description,amount", AccountType::Credit, OnBadDate::Previous);
        r.read_row(1, &rec(&["2023/01/05", "A", "100"])).unwrap();
        let blank = r.read_row(2, &rec(&["", " ", ""])).unwrap();
        assert!(blank.transaction.is_none());
        assert!(matches!(blank.warning, Some(Warning::SkippedRow { row: 2, .. })));
        let next = r.read_row(3, &rec(&["2023/01/06", "B", "200"])).unwrap();
        assert_eq!(next.transaction.unwrap().fitid, 1);
    }

    #[test]
    fn test_ragged_row_reads_missing_cells_as_empty() {
        let mut r = reader("date,description,amount,,memo", AccountType::Credit, OnBadDate::Previous);
        let out = r.read_row(1, &rec(&["2023/01/05", "SHOP", "100"])).unwrap();
        let txn = out.transaction.unwrap();
        assert_eq!(txn.amount, -100);
        assert_eq!(txn.memo, "");
    }

    #[test]
    fn test_invalid_amount_is_fatal() {
        let mut r = reader("date,description,amount", AccountType::Credit, OnBadDate::Previous);
        let err = r.read_row(4, &rec(&["2023/01/05", "SHOP", "abc"])).unwrap_err();
        assert!(matches!(err, ConvError::InvalidAmount { row: 4, .. }));
    }

    #[test]
    fn test_amount_out_of_range_is_an_error() {
        let mut r = reader("date,description,amount", AccountType::Credit, OnBadDate::Previous);
        let err = r
            .read_row(2, &rec(&["2023/01/05", "SHOP", "-9223372036854775808"]))
            .unwrap_err();
        assert!(matches!(err, ConvError::InvalidAmount { row: 2, .. }));

        let mut r = reader("date,description,amount,amount", AccountType::Bank, OnBadDate::Previous);
        let err = r
            .read_row(3, &rec(&["2023/01/05", "SHOP", "9223372036854775807", "1"]))
            .unwrap_err();
        assert!(matches!(err, ConvError::InvalidAmount { row: 3, .. }));

        let mut r = reader("date,description,amount,commission", AccountType::Bank, OnBadDate::Previous);
        let err = r
            .read_row(4, &rec(&["2023/01/05", "FEE", "0", "-9223372036854775808"]))
            .unwrap_err();
        assert!(matches!(err, ConvError::InvalidAmount { row: 4, .. }));
    }

    #[test]
    fn test_missing_date_mapping_rejected() {
        let res = RowReader::new(FieldMap::parse("description,amount"), ReaderOptions::default());
        assert!(res.is_err());
    }

    #[test]
    fn test_timezone_attached() {
        let mut r = RowReader::new(
            FieldMap::parse("date,description,amount"),
            ReaderOptions {
                tzinfo: Some(Timezone::parse("JST-9").unwrap()),
                ..ReaderOptions::default()
            },
        )
        .unwrap();
        let txn = r.read_row(1, &rec(&["2023/01/05", "A", "1"])).unwrap().transaction.unwrap();
        assert_eq!(txn.tzinfo.unwrap().name, "JST");
    }
}
