use std::collections::HashSet;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use encoding_rs::Encoding;
use serde::{Deserialize, Serialize};

use crate::amazon::{AmazonJournal, AGGREGATOR_MARKER};
use crate::codec::read_to_string;
use crate::error::Result;
use crate::fields::FieldMap;
use crate::fmt::normalize;
use crate::models::{Timezone, Transaction, Warning};
use crate::ofx;
use crate::reader::{ReaderOptions, RowReader};
use crate::subst::SubstTable;

/// Columns of a header record holding the card number and holder name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderRow {
    #[serde(default)]
    pub cardnumber_column: Option<usize>,
    #[serde(default)]
    pub cardname_column: Option<usize>,
}

/// Everything needed to read one issuer's statement CSV.
#[derive(Debug, Clone)]
pub struct StatementConfig {
    pub fields: FieldMap,
    pub encoding: &'static Encoding,
    pub skip_lines: usize,
    pub header_row: Option<HeaderRow>,
    pub cardnumber: String,
    pub cardname: String,
    pub reader: ReaderOptions,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WriteOptions {
    pub upper: bool,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

/// Transactions of one statement, in file order.
#[derive(Debug, Clone)]
pub struct Journal {
    pub transactions: Vec<Transaction>,
    pub cardnumber: String,
    pub cardname: String,
    pub generated_at: NaiveDateTime,
    pub tzinfo: Option<Timezone>,
    pub warnings: Vec<Warning>,
}

impl Journal {
    pub fn new(tzinfo: Option<Timezone>) -> Self {
        let generated_at = match &tzinfo {
            Some(tz) => tz.now(),
            None => chrono::Local::now().naive_local(),
        };
        Self {
            transactions: Vec::new(),
            cardnumber: String::new(),
            cardname: String::new(),
            generated_at,
            tzinfo,
            warnings: Vec::new(),
        }
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn read_csv(
        path: &Path,
        config: &StatementConfig,
        amazon: Option<&AmazonJournal>,
        subst: Option<&SubstTable>,
    ) -> Result<Self> {
        let text = read_to_string(path, config.encoding)?;
        Self::parse(&text, config, amazon, subst)
    }

    /// Read statement rows from already-decoded CSV text.
    pub fn parse(
        text: &str,
        config: &StatementConfig,
        amazon: Option<&AmazonJournal>,
        subst: Option<&SubstTable>,
    ) -> Result<Self> {
        let mut journal = Self::new(config.reader.tzinfo.clone());
        journal.cardnumber = config.cardnumber.clone();
        journal.cardname = config.cardname.clone();

        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(text.as_bytes());
        let mut records = rdr.records();

        for _ in 0..config.skip_lines {
            if records.next().transpose()?.is_none() {
                break;
            }
        }
        if let Some(header_row) = config.header_row {
            if let Some(header) = records.next().transpose()? {
                let cell = |col: Option<usize>| {
                    col.and_then(|i| header.get(i))
                        .map(|s| normalize(s.trim()))
                        .unwrap_or_default()
                };
                // Values from the profile win over the header record.
                if journal.cardnumber.is_empty() {
                    journal.cardnumber = cell(header_row.cardnumber_column);
                }
                if journal.cardname.is_empty() {
                    journal.cardname = cell(header_row.cardname_column);
                }
            }
        }

        let mut reader = RowReader::new(config.fields.clone(), config.reader.clone())?;
        for (i, result) in records.enumerate() {
            let record = result?;
            let row = record.position().map_or(i + 1, |p| p.line() as usize);
            let outcome = reader.read_row(row, &record)?;
            if let Some(warning) = outcome.warning {
                journal.warnings.push(warning);
            }
            let Some(mut txn) = outcome.transaction else {
                continue;
            };
            if let Some(az) = amazon {
                if txn.description == AGGREGATOR_MARKER {
                    journal.reconcile(az, &mut txn);
                }
            }
            if let Some(table) = subst {
                txn.memo = table.apply(&txn.memo);
            }
            journal.transactions.push(txn);
        }
        Ok(journal)
    }

    /// Replace the memo of an aggregator line with the items it paid for.
    fn reconcile(&mut self, az: &AmazonJournal, txn: &mut Transaction) {
        let matches = az.search(txn.date, -txn.amount);
        match matches.as_slice() {
            [only] => txn.memo = only.text.clone(),
            _ => self.warnings.push(Warning::AmbiguousCharge {
                date: txn.date,
                amount: -txn.amount,
                matches: matches.len(),
            }),
        }
    }

    /// Drop later rows repeating the (date, description, amount, memo) of an
    /// earlier row. Returns how many were removed.
    pub fn dedupe(&mut self) -> usize {
        let before = self.transactions.len();
        let mut seen = HashSet::new();
        self.transactions.retain(|t| {
            seen.insert((t.date, t.description.clone(), t.amount, t.memo.clone()))
        });
        before - self.transactions.len()
    }

    fn selected(&self, opts: &WriteOptions) -> Vec<&Transaction> {
        let mut selected: Vec<&Transaction> = self
            .transactions
            .iter()
            .filter(|t| t.amount != 0)
            .filter(|t| opts.from.map_or(true, |from| from <= t.date))
            .filter(|t| opts.to.map_or(true, |to| t.date <= to))
            .collect();
        selected.sort_by_key(|t| t.fitid);
        selected
    }

    /// The OFX document, or `None` when no transaction survives filtering.
    pub fn render_ofx(&self, opts: &WriteOptions) -> Option<String> {
        let selected = self.selected(opts);
        let first = *selected.iter().min_by_key(|t| t.date)?;
        let last = *selected.iter().max_by_key(|t| t.date)?;
        let stamp = |t: &Transaction| ofx::ofx_datetime(&t.posted_at(), t.tzinfo.as_ref());

        let mut out = ofx::header(&ofx::Header {
            datetime: &ofx::ofx_datetime(&self.generated_at, self.tzinfo.as_ref()),
            cardname: &self.cardname,
            cardnumber: &self.cardnumber,
            firstdate: &stamp(first),
            lastdate: &stamp(last),
        });
        for &t in &selected {
            let description = normalize(&t.description);
            let description = if opts.upper {
                description.to_uppercase()
            } else {
                description
            };
            out.push_str(&ofx::transaction(&ofx::Entry {
                transaction_type: if t.amount >= 0 { "CREDIT" } else { "DEBIT" },
                datetime: &stamp(t),
                amount: t.amount.unsigned_abs(),
                fitid: t.fitid,
                description: &description,
                memo: &normalize(&t.memo),
            }));
        }
        let total: i128 = selected.iter().map(|t| i128::from(t.amount)).sum();
        out.push_str(&ofx::footer(total));
        Some(out)
    }

    /// Write the OFX document to `path`. Returns `false` and writes nothing
    /// when there is nothing to report.
    pub fn write_ofx(&self, path: &Path, opts: &WriteOptions) -> Result<bool> {
        let Some(doc) = self.render_ofx(opts) else {
            return Ok(false);
        };
        std::fs::write(path, doc)?;
        Ok(true)
    }
}
