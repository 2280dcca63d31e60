use std::error::Error;
use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("config error: {0}")]
    Config(String),
    #[error("storage error for key `{key}`: {reason}")]
    Storage { key: String, reason: String },
}

/// Renders `error` followed by every `source()` in its chain.
pub fn format_error_chain<E: Error + ?Sized>(error: &E) -> String {
    let mut chain = vec![error.to_string()];
    let mut source = error.source();

    while let Some(err) = source {
        chain.push(format!("  caused by: {}", err));
        source = err.source();
    }

    chain.join("\n")
}

/// Logs `error` with its full chain under `context`.
pub fn log_error<E: Error + ?Sized>(context: &str, error: &E) {
    let error_chain = format_error_chain(error);
    tracing::error!(context = context, error = %error_chain, "error occurred");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_includes_sources() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = CoreError::Io(io);
        let rendered = format_error_chain(&err);
        assert!(rendered.starts_with("io error: gone"));
        assert!(rendered.contains("\n  caused by: gone"));
    }

    #[test]
    fn storage_error_names_key() {
        let err = CoreError::Storage {
            key: "activeUsers".to_string(),
            reason: "read-only".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "storage error for key `activeUsers`: read-only"
        );
    }
}
