//! Error handling and display for the CLI.

use colored::Colorize;
use facstat_daemon::store::StoreError;
use thiserror::Error;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Person not found: {0}")]
    NotFound(String),

    #[error("Person already exists: {0}")]
    AlreadyExists(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl From<StoreError> for CliError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => Self::NotFound(id),
            StoreError::AlreadyExists(id) => Self::AlreadyExists(id),
            other => Self::Other(other.into()),
        }
    }
}

/// Print an error in a user-friendly format.
pub fn print_error(err: &anyhow::Error) {
    eprintln!("{} {}", "Error:".red().bold(), err);

    if let Some(cli_err) = err.downcast_ref::<CliError>() {
        match cli_err {
            CliError::NotFound(_) => {
                eprintln!(
                    "\n{}",
                    "Hint: Run `facstat status` to list tracked people.".yellow()
                );
            }
            CliError::AlreadyExists(id) => {
                eprintln!(
                    "\n{}",
                    format!("Hint: Use `facstat person edit {id}` to change an existing person.")
                        .yellow()
                );
            }
            CliError::Other(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_map_to_cli_errors() {
        assert!(matches!(
            CliError::from(StoreError::NotFound("p1".into())),
            CliError::NotFound(id) if id == "p1"
        ));
        assert!(matches!(
            CliError::from(StoreError::AlreadyExists("p1".into())),
            CliError::AlreadyExists(_)
        ));
        assert!(matches!(
            CliError::from(StoreError::Unavailable("down".into())),
            CliError::Other(_)
        ));
    }
}
