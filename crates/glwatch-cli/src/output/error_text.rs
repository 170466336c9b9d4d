use glwatch_engine::EngineError;
use serde_json::Value;

pub fn render_error(error: &EngineError) -> String {
    let mut lines = vec![
        "Something went wrong, but it's easy to fix.".to_string(),
        String::new(),
        format!("  Error:    {}", error.code),
        format!("  Details:  {}", error.message),
    ];

    if let Some(columns) = error
        .data
        .as_ref()
        .and_then(|data| data.get("actual_columns"))
        .and_then(Value::as_array)
    {
        let names = columns
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<&str>>();
        lines.push(format!("  Found:    {}", names.join(", ")));
    }

    lines.push(String::new());
    lines.push("What to do next:".to_string());
    if error.recovery_steps.is_empty() {
        lines.push("  1. Retry the command.".to_string());
    } else {
        for (index, step) in error.recovery_steps.iter().enumerate() {
            lines.push(format!("  {}. {step}", index + 1));
        }
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use glwatch_engine::EngineError;

    use super::render_error;

    #[test]
    fn renders_standard_error_layout() {
        let error = EngineError::invalid_argument_with_recovery(
            "bad input",
            vec!["run glwatch --help".to_string()],
        );

        let rendered = render_error(&error);
        assert!(rendered.starts_with("Something went wrong, but it's easy to fix."));
        assert!(rendered.contains("  Error:    invalid_argument"));
        assert!(rendered.contains("  Details:  bad input"));
        assert!(rendered.contains("What to do next:"));
        assert!(rendered.contains("  1. run glwatch --help"));
    }

    #[test]
    fn missing_columns_lists_found_headers() {
        let error = EngineError::missing_required_columns(
            vec!["GL".to_string(), "Amount".to_string()],
            vec!["Amount".to_string()],
            vec!["GL".to_string(), "Debit".to_string()],
        );
        let rendered = render_error(&error);
        assert!(rendered.contains("  Found:    GL, Debit"));
    }
}
