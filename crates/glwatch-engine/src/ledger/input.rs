use std::fs;
use std::io::{IsTerminal, Read};

use crate::{EngineError, EngineResult};

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum SourceKind {
    File,
    Stdin,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Stdin => "stdin",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedSource {
    pub source_kind: SourceKind,
    pub source_ref: Option<String>,
    pub content: String,
}

impl ResolvedSource {
    fn piped(content: String) -> Self {
        Self {
            source_kind: SourceKind::Stdin,
            source_ref: None,
            content,
        }
    }
}

/// Picks the one ledger extract a run reads: a file path, or piped stdin
/// when the path is `-` or omitted.
///
/// `stdin_override` replaces the process stdin when set.
pub fn resolve_source(
    path: Option<String>,
    stdin_override: Option<String>,
) -> EngineResult<ResolvedSource> {
    let piped = read_piped_ledger(stdin_override)?;

    match (path.as_deref(), piped) {
        (Some("-"), Some(content)) | (None, Some(content)) => Ok(ResolvedSource::piped(content)),
        (Some("-"), None) => Err(EngineError::invalid_argument_with_recovery(
            "`-` reads the ledger from stdin, but nothing was piped in.",
            vec![
                "Pipe the extract in, e.g. `cat gl.csv | glwatch analyze -`.".to_string(),
                "Or pass the extract's file path instead of `-`.".to_string(),
            ],
        )),
        (Some(_), Some(_)) => Err(EngineError::invalid_argument_with_recovery(
            "Got both a ledger path and piped stdin; a run reads exactly one ledger.",
            vec!["Drop the pipe or drop the path argument.".to_string()],
        )),
        (Some(file), None) => read_ledger_file(file),
        (None, None) => Err(EngineError::invalid_argument_with_recovery(
            "No ledger extract given.",
            vec![
                "Pass a CSV or JSON extract path, e.g. `glwatch analyze gl.csv`.".to_string(),
                "Or pipe the extract in with `-` as the path.".to_string(),
            ],
        )),
    }
}

fn read_ledger_file(path: &str) -> EngineResult<ResolvedSource> {
    let content = fs::read_to_string(path).map_err(|error| {
        EngineError::invalid_argument_with_recovery(
            &format!("Could not open ledger extract `{path}`: {error}"),
            vec![
                "Check the extract path and its read permissions.".to_string(),
                "Extracts must be UTF-8 CSV or JSON text.".to_string(),
            ],
        )
    })?;
    Ok(ResolvedSource {
        source_kind: SourceKind::File,
        source_ref: Some(path.to_string()),
        content,
    })
}

/// Piped stdin with content, or `None` for a terminal or a blank pipe.
fn read_piped_ledger(stdin_override: Option<String>) -> EngineResult<Option<String>> {
    let body = match stdin_override {
        Some(value) => value,
        None if std::io::stdin().is_terminal() => return Ok(None),
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .map_err(|error| {
                    EngineError::invalid_argument_with_recovery(
                        &format!("Could not read the piped ledger: {error}"),
                        vec!["Pass the extract as a file path instead.".to_string()],
                    )
                })?;
            buffer
        }
    };

    Ok(Some(body).filter(|value| !value.trim().is_empty()))
}
