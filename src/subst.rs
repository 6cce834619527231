use std::path::Path;

use crate::codec::{decode, detect_encoding};
use crate::error::Result;

/// User-defined memo rewrites, `literal-key=literal-value` per line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubstTable {
    pairs: Vec<(String, String)>,
}

impl SubstTable {
    pub fn read(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let encoding = detect_encoding(&bytes)?;
        Ok(Self::parse(&decode(&bytes, encoding, path)?))
    }

    pub fn parse(text: &str) -> Self {
        let mut table = Self::default();
        for line in text.lines() {
            let line = line.trim_start_matches('\u{FEFF}');
            if line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.trim().split_once('=') else {
                continue;
            };
            if key.is_empty() {
                continue;
            }
            match table.pairs.iter_mut().find(|(k, _)| k == key) {
                Some(pair) => pair.1 = value.to_string(),
                None => table.pairs.push((key.to_string(), value.to_string())),
            }
        }
        table
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Apply every replacement in file order.
    pub fn apply(&self, memo: &str) -> String {
        self.pairs
            .iter()
            .fold(memo.to_string(), |acc, (k, v)| acc.replace(k.as_str(), v))
    }
}
