use crate::cli::{Commands, SnapshotCommand};

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum OutputMode {
    Text,
    Json,
}

pub fn mode_for_command(command: &Commands) -> OutputMode {
    let json = match command {
        Commands::Analyze(args) => args.json,
        Commands::Aggregate(args) => args.json,
        Commands::Snapshot { command } => match command {
            SnapshotCommand::List { json } | SnapshotCommand::Show { json, .. } => *json,
        },
    };

    if json {
        OutputMode::Json
    } else {
        OutputMode::Text
    }
}
