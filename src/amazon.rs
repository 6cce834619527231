use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use chrono::{Duration, NaiveDate};
use serde::Deserialize;

use crate::error::{ConvError, Result};
use crate::fields::{parse_amount, parse_date};
use crate::fmt::omit;

/// Counterpart name of card lines that need the order history to explain them.
pub const AGGREGATOR_MARKER: &str = "AMAZON.CO.JP";

pub const OMIT_WIDTH: usize = 40;

const PSEUDO_ITEMS: &[&str] = &[
    "（注文全体）",
    "（割引）",
    "（配送料・手数料）",
    "（Amazonポイント）",
];
const CHARGE_ITEM: &str = "（クレジットカードへの請求）";

/// One row of the order-history export.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderRow {
    #[serde(rename = "注文番号")]
    pub order_id: String,
    #[serde(rename = "商品名")]
    pub name: String,
    #[serde(rename = "付帯情報", default)]
    pub description: String,
    #[serde(rename = "価格", default)]
    pub price: String,
    #[serde(rename = "個数", default)]
    pub quantity: String,
    #[serde(rename = "商品小計", default)]
    pub subtotal: String,
    #[serde(rename = "注文日", default)]
    pub order_date: String,
    #[serde(rename = "クレカ請求日", default)]
    pub charge_date: String,
    #[serde(rename = "クレカ請求額", default)]
    pub charge_amount: String,
    #[serde(rename = "クレカ種類", default)]
    pub charge_method: String,
}

// ---------------------------------------------------------------------------
// Items, batches and orders
// ---------------------------------------------------------------------------

#[allow(dead_code)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmazonOrderItem {
    pub order_id: String,
    pub name: String,
    pub description: String,
    pub price: String,
    pub quantity: String,
    /// Empty for add-on items bought together with another item.
    pub subtotal: Option<String>,
}

impl From<&OrderRow> for AmazonOrderItem {
    fn from(row: &OrderRow) -> Self {
        let subtotal = row.subtotal.trim();
        Self {
            order_id: row.order_id.clone(),
            name: row.name.clone(),
            description: row.description.clone(),
            price: row.price.clone(),
            quantity: row.quantity.clone(),
            subtotal: (!subtotal.is_empty()).then(|| subtotal.to_string()),
        }
    }
}

impl fmt::Display for AmazonOrderItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Groups of items; each group is a primary item and its add-ons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmazonOrderBatch {
    pub groups: Vec<Vec<AmazonOrderItem>>,
}

impl AmazonOrderBatch {
    pub fn new(primary: AmazonOrderItem) -> Self {
        Self {
            groups: vec![vec![primary]],
        }
    }

    pub fn add_on(&mut self, item: AmazonOrderItem) {
        match self.groups.last_mut() {
            Some(group) => group.push(item),
            None => self.groups.push(vec![item]),
        }
    }

    fn render<F>(&self, name: F) -> String
    where
        F: Fn(&AmazonOrderItem) -> String,
    {
        self.groups
            .iter()
            .map(|group| group.iter().map(&name).collect::<Vec<_>>().join(","))
            .collect::<Vec<_>>()
            .join(";")
    }

    /// Item names shortened to `width` columns each.
    pub fn omitted(&self, width: usize) -> String {
        self.render(|item| omit(&item.name, width))
    }
}

impl fmt::Display for AmazonOrderBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(|item| item.name.clone()))
    }
}

#[allow(dead_code)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Charge {
    pub date: NaiveDate,
    pub amount: i64,
    pub method: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmazonOrder {
    pub order_id: String,
    pub batches: Vec<AmazonOrderBatch>,
    pub charges: Vec<Charge>,
}

impl AmazonOrder {
    pub fn new(order_id: &str) -> Self {
        Self {
            order_id: order_id.to_string(),
            batches: Vec::new(),
            charges: Vec::new(),
        }
    }

    fn charge(date: &str, amount: &str, method: &str, row: usize) -> Result<Charge> {
        Ok(Charge {
            date: parse_date(date)?,
            amount: parse_amount(amount, row)?,
            method: method.to_string(),
        })
    }

    /// Fold one order-history row into this order.
    pub fn add_row(&mut self, row: &OrderRow, row_no: usize) -> Result<()> {
        let name = row.name.trim();
        if PSEUDO_ITEMS.contains(&name) {
            return Ok(());
        }
        if name == CHARGE_ITEM {
            let charge = Self::charge(&row.charge_date, &row.charge_amount, &row.charge_method, row_no)?;
            // The export sometimes repeats a charge row verbatim.
            self.charges.retain(|c| c != &charge);
            self.charges.push(charge);
            return Ok(());
        }
        if !row.charge_amount.trim().is_empty() {
            // Digital items carry their own charge, dated on the order date.
            self.batches.push(AmazonOrderBatch::new(row.into()));
            let charge = Self::charge(&row.order_date, &row.charge_amount, &row.charge_method, row_no)?;
            self.charges.push(charge);
            return Ok(());
        }
        if !row.subtotal.trim().is_empty() {
            self.batches.push(AmazonOrderBatch::new(row.into()));
            return Ok(());
        }
        match self.batches.last_mut() {
            Some(batch) => {
                batch.add_on(row.into());
                Ok(())
            }
            None => Err(ConvError::OrphanAddOn {
                order_id: self.order_id.clone(),
                row: row_no,
            }),
        }
    }

    pub fn omitted(&self, width: usize) -> String {
        self.batches
            .iter()
            .map(|b| b.omitted(width))
            .collect::<Vec<_>>()
            .join(";")
    }

    /// Text describing what the `index`-th charge paid for.
    ///
    /// A single charge covers the whole order; otherwise charges pair with
    /// batches by position.
    pub fn charge_text(&self, index: usize, width: usize) -> String {
        if self.charges.len() == 1 {
            return self.omitted(width);
        }
        match self.batches.get(index) {
            Some(batch) => batch.omitted(width),
            None => self.omitted(width),
        }
    }
}

impl fmt::Display for AmazonOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let batches: Vec<String> = self.batches.iter().map(|b| b.to_string()).collect();
        f.write_str(&batches.join(";;"))
    }
}

// ---------------------------------------------------------------------------
// AmazonJournal
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeMatch {
    pub order_id: String,
    pub text: String,
}

/// Orders keyed by order id, in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct AmazonJournal {
    orders: Vec<AmazonOrder>,
    index: HashMap<String, usize>,
}

impl AmazonJournal {
    pub fn read_csv(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let (text, had_errors) = encoding_rs::UTF_8.decode_with_bom_removal(&bytes);
        if had_errors {
            return Err(ConvError::Decode {
                path: path.display().to_string(),
                encoding: "UTF-8".to_string(),
            });
        }
        Self::parse(&text)
    }

    /// Build the index from export text. A leading BOM is tolerated so
    /// text read by other means can be passed as is.
    pub fn parse(text: &str) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(text.trim_start_matches('\u{FEFF}').as_bytes());
        let mut journal = Self::default();
        for (i, result) in rdr.deserialize::<OrderRow>().enumerate() {
            let row = result?;
            journal.add_row(&row, i + 1)?;
        }
        Ok(journal)
    }

    pub fn add_row(&mut self, row: &OrderRow, row_no: usize) -> Result<()> {
        let idx = match self.index.get(&row.order_id) {
            Some(&idx) => idx,
            None => {
                self.orders.push(AmazonOrder::new(&row.order_id));
                self.index.insert(row.order_id.clone(), self.orders.len() - 1);
                self.orders.len() - 1
            }
        };
        self.orders[idx].add_row(row, row_no)
    }

    #[allow(dead_code)]
    pub fn get(&self, order_id: &str) -> Option<&AmazonOrder> {
        self.index.get(order_id).map(|&idx| &self.orders[idx])
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Charges of `amount` within `[date - 1 day, date + 2 days]`.
    ///
    /// Anything other than exactly one match is ambiguous.
    pub fn search(&self, date: NaiveDate, amount: i64) -> Vec<ChargeMatch> {
        self.search_window(date - Duration::days(1), date + Duration::days(2), amount)
    }

    pub fn search_window(&self, start: NaiveDate, end: NaiveDate, amount: i64) -> Vec<ChargeMatch> {
        let mut result = Vec::new();
        for order in &self.orders {
            for (i, charge) in order.charges.iter().enumerate() {
                if charge.amount == amount && (start..=end).contains(&charge.date) {
                    result.push(ChargeMatch {
                        order_id: order.order_id.clone(),
                        text: order.charge_text(i, OMIT_WIDTH),
                    });
                }
            }
        }
        result
    }
}
