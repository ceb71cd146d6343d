use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("io error: {0}")]
    Io(String),
    #[error("config parse error: {0}")]
    ConfigParse(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("malformed record at line {line}: {message}")]
    MalformedRecord { line: usize, message: String },
    #[error("interaction log not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("no such element: {0}")]
    NoSuchElement(String),
    #[error("cannot resolve active query card for step {index}")]
    ContextNotFound { index: usize },
    #[error("no handler for step {index} event/action={event}/{action}")]
    NoHandler {
        index: usize,
        event: String,
        action: String,
    },
    #[error("timed out: {0}")]
    Timeout(String),
    #[error("script error: {0}")]
    Script(String),
    #[error("driver error: {0}")]
    Driver(String),
    #[error(
        "replay failed on step={index} line={line} seq={} event={event}/{action} testId={}: {source}",
        display_opt(seq),
        display_opt(test_id)
    )]
    StepFailed {
        index: usize,
        line: usize,
        seq: Option<i64>,
        event: String,
        action: String,
        test_id: Option<String>,
        #[source]
        source: Box<ReplayError>,
    },
}

impl ReplayError {
    /// The innermost error, unwrapping any `StepFailed` context.
    pub fn root(&self) -> &ReplayError {
        match self {
            Self::StepFailed { source, .. } => source.root(),
            other => other,
        }
    }
}

fn display_opt<T: std::fmt::Display>(value: &Option<T>) -> String {
    value
        .as_ref()
        .map_or_else(|| "None".to_string(), |v| v.to_string())
}

#[cfg(test)]
mod tests {
    use super::ReplayError;

    #[test]
    fn step_failed_message_names_step_context() {
        let err = ReplayError::StepFailed {
            index: 3,
            line: 5,
            seq: Some(12),
            event: "click".to_string(),
            action: "preview".to_string(),
            test_id: None,
            source: Box::new(ReplayError::ContextNotFound { index: 3 }),
        };
        let text = err.to_string();
        assert!(text.contains("step=3 line=5 seq=12 event=click/preview testId=None"));
        assert!(text.contains("cannot resolve active query card"));
        assert!(matches!(err.root(), ReplayError::ContextNotFound { index: 3 }));
    }
}
