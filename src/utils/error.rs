use thiserror::Error;

#[derive(Error, Debug)]
pub enum CopyError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Compose file error: {message}")]
    ComposeError { message: String },

    #[error("Schema error on table '{table}': {message}")]
    SchemaError { table: String, message: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Connection,
    Database,
    Schema,
    Io,
    Data,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl CopyError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            CopyError::DatabaseError(e) if is_connection_error(e) => ErrorCategory::Connection,
            CopyError::DatabaseError(_) => ErrorCategory::Database,
            CopyError::IoError(_) => ErrorCategory::Io,
            CopyError::SerializationError(_) | CopyError::ProcessingError { .. } => {
                ErrorCategory::Data
            }
            CopyError::SchemaError { .. } => ErrorCategory::Schema,
            CopyError::YamlError(_)
            | CopyError::ConfigError { .. }
            | CopyError::MissingConfigError { .. }
            | CopyError::InvalidConfigValueError { .. }
            | CopyError::ConfigValidationError { .. }
            | CopyError::ComposeError { .. } => ErrorCategory::Configuration,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            // The containers may simply not be up yet.
            ErrorCategory::Connection => ErrorSeverity::Medium,
            ErrorCategory::Configuration | ErrorCategory::Schema | ErrorCategory::Data => {
                ErrorSeverity::High
            }
            ErrorCategory::Database | ErrorCategory::Io => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Connection => {
                "Start the database containers with `docker compose up -d` and check DB_IN / DB_OUT"
            }
            ErrorCategory::Configuration => {
                "Check the command line flags, the TOML config file and the compose file"
            }
            ErrorCategory::Schema => {
                "Rename the source table or use a shorter --table-prefix, or exclude the table with --exclude"
            }
            ErrorCategory::Data => "Inspect the offending rows in the source database",
            ErrorCategory::Database => {
                "Check that the configured users have CREATE, DROP and INSERT privileges"
            }
            ErrorCategory::Io => "Check file paths and permissions",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Connection => format!("Could not reach a database: {}", self),
            ErrorCategory::Configuration => format!("Invalid configuration: {}", self),
            ErrorCategory::Schema => format!("Cannot recreate table: {}", self),
            ErrorCategory::Data => format!("Cannot copy data: {}", self),
            ErrorCategory::Database => format!("Database operation failed: {}", self),
            ErrorCategory::Io => format!("File operation failed: {}", self),
        }
    }

    /// Process exit code for a failed run.
    pub fn exit_code(&self) -> i32 {
        match self.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }
}

fn is_connection_error(e: &sqlx::Error) -> bool {
    matches!(
        e,
        sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Configuration(_)
    )
}

pub type Result<T> = std::result::Result<T, CopyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_errors_are_retryable() {
        let err = CopyError::DatabaseError(sqlx::Error::PoolTimedOut);
        assert_eq!(err.category(), ErrorCategory::Connection);
        assert_eq!(err.severity(), ErrorSeverity::Medium);
        assert_eq!(err.exit_code(), 2);
        assert!(err.recovery_suggestion().contains("docker compose up"));
    }

    #[test]
    fn test_config_errors_map_to_exit_code_one() {
        let err = CopyError::MissingConfigError {
            field: "source.url".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert_eq!(err.exit_code(), 1);
        assert!(err.user_friendly_message().contains("source.url"));
    }

    #[test]
    fn test_row_not_found_is_database_error() {
        let err = CopyError::DatabaseError(sqlx::Error::RowNotFound);
        assert_eq!(err.category(), ErrorCategory::Database);
        assert_eq!(err.severity(), ErrorSeverity::Critical);
    }
}
