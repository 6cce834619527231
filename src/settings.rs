use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::codec::{resolve_encoding, DEFAULT_CSV_ENCODING};
use crate::error::{ConvError, Result};
use crate::fields::FieldMap;
use crate::journal::{HeaderRow, StatementConfig};
use crate::models::{AccountType, Timezone};
use crate::reader::{OnBadDate, ReaderOptions};

pub const DEFAULT_TIMEZONE: &str = "JST-9";

/// Settings shared by every issuer unless the issuer overrides them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Defaults {
    #[serde(default)]
    pub encoding: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub on_bad_date: Option<OnBadDate>,
}

/// One issuer's CSV layout. Unset fields come from `include`, then `defaults`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub include: Option<String>,
    #[serde(rename = "type", default)]
    pub account_type: Option<AccountType>,
    #[serde(default)]
    pub encoding: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub cardnumber: Option<String>,
    #[serde(default)]
    pub cardname: Option<String>,
    #[serde(default)]
    pub skip_lines: Option<usize>,
    #[serde(default)]
    pub header_row: Option<HeaderRow>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub on_bad_date: Option<OnBadDate>,
}

impl Profile {
    /// Fill every unset field from `base`.
    fn inherit(self, base: &Profile) -> Profile {
        Profile {
            include: self.include,
            account_type: self.account_type.or(base.account_type),
            encoding: self.encoding.or_else(|| base.encoding.clone()),
            timezone: self.timezone.or_else(|| base.timezone.clone()),
            cardnumber: self.cardnumber.or_else(|| base.cardnumber.clone()),
            cardname: self.cardname.or_else(|| base.cardname.clone()),
            skip_lines: self.skip_lines.or(base.skip_lines),
            header_row: self.header_row.or(base.header_row),
            body: self.body.or_else(|| base.body.clone()),
            on_bad_date: self.on_bad_date.or(base.on_bad_date),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub defaults: Defaults,
    #[serde(default)]
    pub issuers: BTreeMap<String, Profile>,
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("csv2ofx")
}

pub fn settings_path() -> PathBuf {
    config_dir().join("issuers.json")
}

pub fn load_settings(path: Option<&Path>) -> Result<Settings> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(settings_path);
    let content = std::fs::read_to_string(&path).map_err(|e| {
        ConvError::Settings(format!("cannot read {}: {e}", path.display()))
    })?;
    Settings::parse(&content)
}

impl Settings {
    /// Parse a settings document and reject broken include graphs.
    pub fn parse(content: &str) -> Result<Self> {
        let settings: Settings = serde_json::from_str(content.trim_start_matches('\u{FEFF}'))?;
        settings.check_includes()?;
        Ok(settings)
    }

    pub fn issuer_names(&self) -> Vec<&str> {
        self.issuers.keys().map(String::as_str).collect()
    }

    /// Issuer names from `name` up its include chain. Fails on unknown names
    /// and cycles.
    fn include_chain<'a>(&'a self, name: &'a str) -> Result<Vec<&'a str>> {
        let mut chain = vec![name];
        let mut current = self
            .issuers
            .get(name)
            .ok_or_else(|| ConvError::UnknownIssuer(name.to_string()))?;
        while let Some(next) = current.include.as_deref() {
            let next = next.trim_matches(|c| c == '[' || c == ']');
            if chain.contains(&next) {
                chain.push(next);
                return Err(ConvError::IncludeCycle(chain.join(" -> ")));
            }
            current = self
                .issuers
                .get(next)
                .ok_or_else(|| ConvError::UnknownIssuer(next.to_string()))?;
            chain.push(next);
        }
        Ok(chain)
    }

    fn check_includes(&self) -> Result<()> {
        for name in self.issuers.keys() {
            self.include_chain(name)?;
        }
        Ok(())
    }

    /// The profile for `name` with inherited values merged in.
    pub fn profile(&self, name: &str) -> Result<Profile> {
        let chain = self.include_chain(name)?;
        let mut merged = Profile::default();
        for issuer in chain.iter().rev() {
            merged = self.issuers[*issuer].clone().inherit(&merged);
        }
        Ok(merged)
    }

    /// Build the statement reader configuration for `name`. `timezone`
    /// overrides whatever the profile says.
    pub fn statement_config(&self, name: &str, timezone: Option<&str>) -> Result<StatementConfig> {
        let profile = self.profile(name)?;
        let body = profile
            .body
            .as_deref()
            .ok_or_else(|| ConvError::Settings(format!("issuer {name} has no body mapping")))?;

        let encoding = profile
            .encoding
            .as_deref()
            .or(self.defaults.encoding.as_deref())
            .unwrap_or(DEFAULT_CSV_ENCODING);
        let tz = timezone
            .or(profile.timezone.as_deref())
            .or(self.defaults.timezone.as_deref())
            .unwrap_or(DEFAULT_TIMEZONE);
        let tzinfo = if tz.trim().is_empty() {
            None
        } else {
            Some(Timezone::parse(tz)?)
        };

        Ok(StatementConfig {
            fields: FieldMap::parse(body),
            encoding: resolve_encoding(encoding)?,
            skip_lines: profile.skip_lines.unwrap_or(0),
            header_row: profile.header_row,
            cardnumber: profile.cardnumber.unwrap_or_default(),
            cardname: profile.cardname.unwrap_or_default(),
            reader: ReaderOptions {
                account_type: profile.account_type.unwrap_or_default(),
                on_bad_date: profile
                    .on_bad_date
                    .or(self.defaults.on_bad_date)
                    .unwrap_or_default(),
                tzinfo,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "defaults": { "timezone": "JST-9", "on_bad_date": "skip" },
        "issuers": {
            "smbc": {
                "type": "credit",
                "cardname": "SMBC VISA",
                "skip_lines": 1,
                "body": "date,description,amount,,,memo"
            },
            "smbc-family": {
                "include": "smbc",
                "cardname": "SMBC FAMILY"
            },
            "mufg": {
                "type": "bank",
                "encoding": "utf-8",
                "timezone": "",
                "header_row": { "cardnumber_column": 2 },
                "body": "date?,description,-amount,+amount,memo",
                "on_bad_date": "previous"
            }
        }
    }"#;

    #[test]
    fn test_issuer_names_sorted() {
        let s = Settings::parse(SAMPLE).unwrap();
        assert_eq!(s.issuer_names(), vec!["mufg", "smbc", "smbc-family"]);
    }

    #[test]
    fn test_statement_config_defaults() {
        let s = Settings::parse(SAMPLE).unwrap();
        let cfg = s.statement_config("smbc", None).unwrap();
        assert_eq!(cfg.encoding, encoding_rs::SHIFT_JIS);
        assert_eq!(cfg.skip_lines, 1);
        assert_eq!(cfg.cardname, "SMBC VISA");
        assert_eq!(cfg.reader.account_type, AccountType::Credit);
        assert_eq!(cfg.reader.on_bad_date, OnBadDate::Skip);
        assert_eq!(cfg.reader.tzinfo.unwrap().offset_secs, 9 * 3600);
        assert_eq!(cfg.fields.indices("memo"), &[5]);
    }

    #[test]
    fn test_include_inherits_and_overrides() {
        let s = Settings::parse(SAMPLE).unwrap();
        let cfg = s.statement_config("smbc-family", None).unwrap();
        assert_eq!(cfg.cardname, "SMBC FAMILY");
        assert_eq!(cfg.skip_lines, 1);
        assert_eq!(cfg.fields.indices("amount"), &[2]);
    }

    #[test]
    fn test_empty_timezone_is_naive_and_override_wins() {
        let s = Settings::parse(SAMPLE).unwrap();
        let cfg = s.statement_config("mufg", None).unwrap();
        assert!(cfg.reader.tzinfo.is_none());
        assert_eq!(cfg.reader.account_type, AccountType::Bank);
        assert_eq!(cfg.header_row.unwrap().cardnumber_column, Some(2));
        let cfg = s.statement_config("mufg", Some("PST+8")).unwrap();
        assert_eq!(cfg.reader.tzinfo.unwrap().name, "PST");
    }

    #[test]
    fn test_include_cycle_rejected_up_front() {
        let json = r#"{ "issuers": {
            "a": { "include": "b", "body": "date,amount" },
            "b": { "include": "c" },
            "c": { "include": "a" },
            "d": { "body": "date,amount" }
        } }"#;
        match Settings::parse(json) {
            Err(ConvError::IncludeCycle(chain)) => assert_eq!(chain, "a -> b -> c -> a"),
            other => panic!("expected include cycle, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_include_rejected() {
        let json = r#"{ "issuers": { "a": { "include": "[nowhere]" } } }"#;
        assert!(matches!(
            Settings::parse(json),
            Err(ConvError::UnknownIssuer(name)) if name == "nowhere"
        ));
    }

    #[test]
    fn test_unknown_issuer_and_missing_body() {
        let s = Settings::parse(r#"{ "issuers": { "x": { "type": "credit" } } }"#).unwrap();
        assert!(matches!(s.statement_config("y", None), Err(ConvError::UnknownIssuer(_))));
        assert!(matches!(s.statement_config("x", None), Err(ConvError::Settings(_))));
    }

    #[test]
    fn test_load_settings_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("issuers.json");
        std::fs::write(&path, SAMPLE).unwrap();
        let s = load_settings(Some(&path)).unwrap();
        assert_eq!(s.issuers.len(), 3);
        assert!(load_settings(Some(&dir.path().join("missing.json"))).is_err());
    }
}
