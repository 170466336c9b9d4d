use glwatch_engine::commands;
use glwatch_engine::commands::aggregate::AggregateRunOptions;
use glwatch_engine::commands::analyze::{AnalyzeRunOptions, PreviousSource};
use glwatch_engine::{EngineResult, SuccessEnvelope};

use crate::cli::{AnalyzeArgs, Cli, Commands, SnapshotCommand};

pub fn dispatch(cli: &Cli) -> EngineResult<SuccessEnvelope> {
    match &cli.command {
        Commands::Analyze(args) => commands::analyze::run(analyze_options(args)),
        Commands::Aggregate(args) => commands::aggregate::run(AggregateRunOptions {
            path: args.path.clone(),
            config_path: args.frame.config.clone(),
            overrides: args.frame.overrides(),
            ..AggregateRunOptions::default()
        }),
        Commands::Snapshot { command } => match command {
            SnapshotCommand::List { .. } => commands::snapshot::list(),
            SnapshotCommand::Show { snapshot_id, .. } => {
                commands::snapshot::show(snapshot_id.clone())
            }
        },
    }
}

fn analyze_options(args: &AnalyzeArgs) -> AnalyzeRunOptions<'static> {
    let previous = match (&args.previous, args.no_previous) {
        (Some(path), _) => PreviousSource::File(path.clone()),
        (None, true) => PreviousSource::Skip,
        (None, false) => PreviousSource::LatestStored,
    };

    AnalyzeRunOptions {
        path: args.path.clone(),
        config_path: args.frame.config.clone(),
        overrides: args.overrides(),
        previous,
        save_snapshot: args.save_snapshot,
        period: args.period.as_ref().map(|period| period.as_str().to_string()),
        export_flagged: args.export_flagged.clone(),
        ..AnalyzeRunOptions::default()
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use glwatch_engine::commands::analyze::PreviousSource;

    use crate::cli::{Commands, parse_from};

    use super::analyze_options;

    #[test]
    fn previous_flags_pick_the_previous_source() {
        let cases: [(&[&str], PreviousSource); 3] = [
            (&["glwatch", "analyze", "x.csv"], PreviousSource::LatestStored),
            (
                &["glwatch", "analyze", "x.csv", "--no-previous"],
                PreviousSource::Skip,
            ),
            (
                &["glwatch", "analyze", "x.csv", "--previous", "prev.json"],
                PreviousSource::File(PathBuf::from("prev.json")),
            ),
        ];

        for (args, expected) in cases {
            let parsed = parse_from(args);
            assert!(parsed.is_ok());
            if let Ok(cli) = parsed
                && let Commands::Analyze(analyze) = &cli.command
            {
                assert_eq!(analyze_options(analyze).previous, expected);
            }
        }
    }

    #[test]
    fn period_and_save_flags_flow_into_options() {
        let parsed = parse_from([
            "glwatch",
            "analyze",
            "x.csv",
            "--save-snapshot",
            "--period",
            "2024-03",
            "--export-flagged",
            "out.csv",
        ]);
        assert!(parsed.is_ok());
        if let Ok(cli) = parsed
            && let Commands::Analyze(analyze) = &cli.command
        {
            let options = analyze_options(analyze);
            assert!(options.save_snapshot);
            assert_eq!(options.period.as_deref(), Some("2024-03"));
            assert_eq!(options.export_flagged, Some(PathBuf::from("out.csv")));
            assert!(options.home_override.is_none());
        }
    }
}
