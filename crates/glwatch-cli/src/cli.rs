use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use glwatch_engine::commands::common::{ConfigOverrides, GroupingChoice};
use glwatch_engine::detection::{AggregateField, SignRule};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Period(pub String);

impl Period {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

pub fn parse_period(value: &str) -> Result<Period, String> {
    let bytes = value.as_bytes();
    if value.len() != 7 || bytes[4] != b'-' {
        return Err("period must use YYYY-MM format".to_string());
    }

    for index in [0usize, 1, 2, 3, 5, 6] {
        if !bytes[index].is_ascii_digit() {
            return Err("period must use YYYY-MM format".to_string());
        }
    }

    if NaiveDate::parse_from_str(&format!("{value}-01"), "%Y-%m-%d").is_err() {
        return Err("period must use a valid calendar month".to_string());
    }

    Ok(Period(value.to_string()))
}

/// Extended help shown after `glwatch analyze --help`.
pub const ANALYZE_AFTER_HELP: &str = "\
Input:
  A GL extract as CSV with a header row, or a JSON array of row objects.
  Only the GL code and amount columns are read; other columns are ignored.
  Column names default to `GL` and `Amount` (matched case-insensitively).
  <path> is a local file path. Use `-` to read stdin.
  Example: cat ledger.csv | glwatch analyze -

Rows:
  Rows with a missing or non-numeric GL code or amount are dropped and counted.
  A missing GL or amount column fails the run before anything is computed.

Detectors:
  z-score    groups whose aggregate lies more than --z-threshold standard
             deviations from the mean across groups
  change     per-group difference against the previous period, flagged when
             |diff| >= --min-abs-change or |pct| >= --min-pct-change
  sign       transactions whose sign disagrees with the majority sign of
             their GL range (or the category convention with --sign-rule convention)

Previous period:
  By default the latest saved snapshot with the same grouping is compared.
  Use --previous <file> for a snapshot or aggregate JSON file, or
  --no-previous to skip the comparison. Save this run with --save-snapshot.

Config:
  --config <file> reads a JSON object with optional `columns`, `grouping`,
  and `policy` keys. Flags override values from the file.
";

#[derive(Debug, Parser)]
#[command(
    name = "glwatch",
    version,
    about = "GL aggregation and anomaly detection",
    disable_help_subcommand = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Aggregate a GL extract and report z-score, change, and sign anomalies
    #[command(after_long_help = ANALYZE_AFTER_HELP)]
    Analyze(AnalyzeArgs),
    /// Show grouped totals for a GL extract without running detectors
    Aggregate(AggregateArgs),
    /// Inspect saved aggregate snapshots
    #[command(arg_required_else_help = true)]
    Snapshot {
        #[command(subcommand)]
        command: SnapshotCommand,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum GroupingArg {
    Category,
    Range,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FieldArg {
    Net,
    PositiveTotal,
    NegativeTotal,
    Count,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SignRuleArg {
    Majority,
    Convention,
}

#[derive(Debug, Clone, Args)]
pub struct FrameArgs {
    /// Group by leading-digit category or fixed-width GL range
    #[arg(long, value_enum)]
    pub grouping: Option<GroupingArg>,
    /// Range width for `--grouping range` (default 10000000)
    #[arg(long)]
    pub step: Option<i64>,
    /// Header of the GL code column (default `GL`)
    #[arg(long)]
    pub gl_column: Option<String>,
    /// Header of the amount column (default `Amount`)
    #[arg(long)]
    pub amount_column: Option<String>,
    /// JSON config file; flags override its values
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
pub struct AnalyzeArgs {
    /// Path to a CSV or JSON ledger extract (use `-` for stdin)
    pub path: Option<String>,
    #[command(flatten)]
    pub frame: FrameArgs,
    /// Z-score threshold; groups strictly above it are flagged
    #[arg(long)]
    pub z_threshold: Option<f64>,
    /// Aggregate field the z-score detector reads
    #[arg(long, value_enum)]
    pub zscore_field: Option<FieldArg>,
    /// Absolute net change that flags a group
    #[arg(long)]
    pub min_abs_change: Option<f64>,
    /// Percentage net change that flags a group
    #[arg(long)]
    pub min_pct_change: Option<f64>,
    /// Width of the GL ranges checked for sign anomalies
    #[arg(long)]
    pub sign_step: Option<i64>,
    /// How a range's expected sign is chosen
    #[arg(long, value_enum)]
    pub sign_rule: Option<SignRuleArg>,
    /// Previous-period snapshot or aggregate JSON file
    #[arg(long, conflicts_with = "no_previous")]
    pub previous: Option<PathBuf>,
    /// Skip the previous-period comparison
    #[arg(long)]
    pub no_previous: bool,
    /// Save this run's aggregates as a snapshot
    #[arg(long)]
    pub save_snapshot: bool,
    /// Period label stored with the snapshot (YYYY-MM)
    #[arg(long, value_parser = parse_period, requires = "save_snapshot")]
    pub period: Option<Period>,
    /// Write flagged change records to a CSV file
    #[arg(long)]
    pub export_flagged: Option<PathBuf>,
    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone, Args)]
pub struct AggregateArgs {
    /// Path to a CSV or JSON ledger extract (use `-` for stdin)
    pub path: Option<String>,
    #[command(flatten)]
    pub frame: FrameArgs,
    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone, Subcommand)]
pub enum SnapshotCommand {
    /// List saved snapshots, newest first
    List {
        /// Emit machine-readable JSON output
        #[arg(long)]
        json: bool,
    },
    /// Show one snapshot with its aggregates
    Show {
        /// The snapshot ID to show (e.g. snap_01J...)
        snapshot_id: String,
        /// Emit machine-readable JSON output
        #[arg(long)]
        json: bool,
    },
}

impl FrameArgs {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            grouping: self.grouping.map(|value| match value {
                GroupingArg::Category => GroupingChoice::Category,
                GroupingArg::Range => GroupingChoice::Range,
            }),
            step: self.step,
            gl_column: self.gl_column.clone(),
            amount_column: self.amount_column.clone(),
            ..ConfigOverrides::default()
        }
    }
}

impl AnalyzeArgs {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            z_threshold: self.z_threshold,
            zscore_field: self.zscore_field.map(|value| match value {
                FieldArg::Net => AggregateField::Net,
                FieldArg::PositiveTotal => AggregateField::PositiveTotal,
                FieldArg::NegativeTotal => AggregateField::NegativeTotal,
                FieldArg::Count => AggregateField::Count,
            }),
            min_abs_change: self.min_abs_change,
            min_pct_change: self.min_pct_change,
            sign_step: self.sign_step,
            sign_rule: self.sign_rule.map(|value| match value {
                SignRuleArg::Majority => SignRule::Majority,
                SignRuleArg::Convention => SignRule::Convention,
            }),
            ..self.frame.overrides()
        }
    }
}

#[cfg(test)]
pub fn parse_from<I, T>(itr: I) -> Result<Cli, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    Cli::try_parse_from(itr)
}
