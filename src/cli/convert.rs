use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use colored::Colorize;
use tracing::{error, info, warn};

use super::ConvertArgs;
use crate::amazon::AmazonJournal;
use crate::error::{ConvError, Result};
use crate::journal::{Journal, StatementConfig, WriteOptions};
use crate::settings::load_settings;
use crate::subst::SubstTable;

/// `X.csv` becomes `X.ofx`; anything else is refused.
pub fn ofx_path(path: &Path) -> Result<PathBuf> {
    let is_csv = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
    if !is_csv {
        return Err(ConvError::UnsupportedFile(path.display().to_string()));
    }
    Ok(path.with_extension("ofx"))
}

pub struct ConvertJob<'a> {
    pub config: &'a StatementConfig,
    pub amazon: Option<&'a AmazonJournal>,
    pub subst: Option<&'a SubstTable>,
    pub dedupe: bool,
    pub write: WriteOptions,
}

impl ConvertJob<'_> {
    /// Convert one statement. Returns the written path, or `None` when the
    /// statement had nothing to write.
    pub fn convert_file(&self, path: &Path) -> anyhow::Result<Option<PathBuf>> {
        let out = ofx_path(path)?;
        let mut journal = Journal::read_csv(path, self.config, self.amazon, self.subst)
            .with_context(|| format!("reading {}", path.display()))?;
        info!("{}: read {} transactions", path.display(), journal.len());
        for warning in &journal.warnings {
            warn!("{}: {warning}", path.display());
        }
        if self.dedupe {
            let removed = journal.dedupe();
            if removed > 0 {
                info!("{}: dropped {removed} repeated row(s)", path.display());
            }
        }
        let written = journal
            .write_ofx(&out, &self.write)
            .with_context(|| format!("writing {}", out.display()))?;
        Ok(written.then_some(out))
    }
}

pub fn run(args: &ConvertArgs) -> anyhow::Result<()> {
    let settings = load_settings(args.conf.as_deref())?;
    let config = settings.statement_config(&args.issuer, args.timezone.as_deref())?;

    let amazon = match &args.amazon {
        Some(path) => {
            let az = AmazonJournal::read_csv(path)
                .with_context(|| format!("reading order history {}", path.display()))?;
            info!("loaded {} orders from {}", az.len(), path.display());
            Some(az)
        }
        None => None,
    };
    let subst = match &args.subst {
        Some(path) => {
            let table = SubstTable::read(path)
                .with_context(|| format!("reading substitution table {}", path.display()))?;
            info!("loaded {} memo substitutions from {}", table.len(), path.display());
            Some(table)
        }
        None => None,
    };

    let job = ConvertJob {
        config: &config,
        amazon: amazon.as_ref(),
        subst: subst.as_ref(),
        dedupe: args.dedupe,
        write: WriteOptions {
            upper: args.upper,
            from: args.from,
            to: args.to,
        },
    };

    let mut failed = 0usize;
    for path in &args.paths {
        match job.convert_file(path) {
            Ok(Some(out)) => println!("{} {}", "Wrote".green(), out.display()),
            Ok(None) => println!(
                "{} {} (no transactions to write)",
                "Skipped".yellow(),
                path.display()
            ),
            Err(e) => {
                error!("{e:#}");
                failed += 1;
            }
        }
    }

    if failed > 0 {
        bail!("{failed} of {} file(s) failed", args.paths.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::FieldMap;
    use crate::models::AccountType;
    use crate::reader::ReaderOptions;

    fn config() -> StatementConfig {
        StatementConfig {
            fields: FieldMap::parse("date,description,amount,memo"),
            encoding: encoding_rs::UTF_8,
            skip_lines: 0,
            header_row: None,
            cardnumber: "0000".to_string(),
            cardname: "CARD".to_string(),
            reader: ReaderOptions {
                account_type: AccountType::Credit,
                ..ReaderOptions::default()
            },
        }
    }

    #[test]
    fn test_ofx_path() {
        assert_eq!(ofx_path(Path::new("a/b.CSV")).unwrap(), PathBuf::from("a/b.ofx"));
        assert!(matches!(
            ofx_path(Path::new("b.txt")),
            Err(ConvError::UnsupportedFile(_))
        ));
        assert!(ofx_path(Path::new("noext")).is_err());
    }

    #[test]
    fn test_convert_file_writes_beside_input() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = dir.path().join("2023-01.csv");
        std::fs::write(&csv_path, "2023/01/05,SHOP,1200,\n2023/01/05,SHOP,1200,\n").unwrap();
        let cfg = config();
        let job = ConvertJob {
            config: &cfg,
            amazon: None,
            subst: None,
            dedupe: true,
            write: WriteOptions::default(),
        };
        let out = job.convert_file(&csv_path).unwrap().unwrap();
        assert_eq!(out, dir.path().join("2023-01.ofx"));
        let doc = std::fs::read_to_string(&out).unwrap();
        assert_eq!(doc.matches("<STMTTRN>").count(), 1);
        assert!(doc.contains("<BALAMT>-1200\n"));
    }

    #[test]
    fn test_convert_file_with_nothing_to_write() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = dir.path().join("empty.csv");
        std::fs::write(&csv_path, "2023/01/05,NOTE,0,\n").unwrap();
        let cfg = config();
        let job = ConvertJob {
            config: &cfg,
            amazon: None,
            subst: None,
            dedupe: false,
            write: WriteOptions::default(),
        };
        assert!(job.convert_file(&csv_path).unwrap().is_none());
        assert!(!dir.path().join("empty.ofx").exists());
    }
}
