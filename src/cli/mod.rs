pub mod convert;
pub mod issuers;

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

use crate::fields::parse_date;

fn parse_date_arg(s: &str) -> Result<NaiveDate, String> {
    parse_date(s).map_err(|e| e.to_string())
}

#[derive(Parser)]
#[command(
    name = "csv2ofx",
    version,
    about = "Convert bank and credit card CSV statements to OFX."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Convert CSV statements; each X.csv is written as X.ofx beside it.
    Convert(ConvertArgs),
    /// List the issuer profiles defined in the configuration.
    Issuers {
        /// Configuration file (default: ~/.config/csv2ofx/issuers.json)
        #[arg(short = 'f', long)]
        conf: Option<PathBuf>,
    },
}

#[derive(Args)]
pub struct ConvertArgs {
    /// CSV statement files
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,
    /// Configuration file (default: ~/.config/csv2ofx/issuers.json)
    #[arg(short = 'f', long)]
    pub conf: Option<PathBuf>,
    /// Issuer profile name
    #[arg(short = 'i', long)]
    pub issuer: String,
    /// Amazon.co.jp order history CSV used to explain AMAZON.CO.JP lines
    #[arg(short = 'a', long)]
    pub amazon: Option<PathBuf>,
    /// Memo substitution table (key=value per line)
    #[arg(short = 's', long)]
    pub subst: Option<PathBuf>,
    /// Timezone, e.g. JST-9, PST+8, GMT+0
    #[arg(short = 'z', long)]
    pub timezone: Option<String>,
    /// Coerce descriptions to uppercase
    #[arg(long)]
    pub upper: bool,
    /// Only write transactions on or after this date
    #[arg(long, value_parser = parse_date_arg)]
    pub from: Option<NaiveDate>,
    /// Only write transactions on or before this date
    #[arg(long, value_parser = parse_date_arg)]
    pub to: Option<NaiveDate>,
    /// Drop rows repeating the date, description, amount and memo of an earlier row
    #[arg(long)]
    pub dedupe: bool,
}
