use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the ToU calculator.
#[derive(Error, Debug)]
pub enum TouError {
    /// No header cell names a date column, so no row can be placed in time.
    #[error("Date column not found in [{header}]")]
    DateColumnNotFound { header: String },

    /// The calculation was asked to run with missing or unusable settings.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The usage file is neither CSV nor XLSX.
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(PathBuf),

    /// A source file was readable but held no rows.
    #[error("No data available in {0}")]
    NoData(PathBuf),

    /// A CSV document could not be parsed.
    #[error("Failed to parse CSV: {0}")]
    Csv(#[from] csv::Error),

    /// A spreadsheet workbook could not be opened or its sheet read.
    #[error("Failed to read workbook: {0}")]
    Workbook(String),

    /// A JSON document could not be parsed.
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// A tariff schedule row or range expression is malformed.
    #[error("Invalid tariff schedule: {0}")]
    ScheduleParse(String),

    /// A tariff rate value is not a decimal number.
    #[error("Invalid tariff rate: {0}")]
    InvalidRate(String),

    /// A fixed charge specification could not be understood.
    #[error("Invalid fixed charge: {0}")]
    InvalidFixedCharge(String),

    /// A datum property name is not one of the known properties.
    #[error("Unknown datum property: {0}")]
    InvalidProperty(String),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Catch-all for errors from third-party crates via `anyhow`.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Convenience alias used throughout the calculator crates.
pub type Result<T> = std::result::Result<T, TouError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_date_column_not_found() {
        let err = TouError::DateColumnNotFound {
            header: "Reading,Value".to_string(),
        };
        assert_eq!(err.to_string(), "Date column not found in [Reading,Value]");
    }

    #[test]
    fn test_error_display_file_read() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err = TouError::FileRead {
            path: PathBuf::from("/some/usage.csv"),
            source: io_err,
        };
        let msg = err.to_string();
        assert!(msg.contains("Failed to read file"));
        assert!(msg.contains("/some/usage.csv"));
        assert!(msg.contains("no such file"));
    }

    #[test]
    fn test_error_display_invalid_config() {
        let err = TouError::InvalidConfig("quantity must be positive".to_string());
        assert_eq!(
            err.to_string(),
            "Invalid configuration: quantity must be positive"
        );
    }

    #[test]
    fn test_error_display_unsupported_file_type() {
        let err = TouError::UnsupportedFileType(PathBuf::from("usage.ods"));
        assert_eq!(err.to_string(), "Unsupported file type: usage.ods");
    }

    #[test]
    fn test_error_display_schedule_parse() {
        let err = TouError::ScheduleParse("bad month range: Foo".to_string());
        assert_eq!(
            err.to_string(),
            "Invalid tariff schedule: bad month range: Foo"
        );
    }

    #[test]
    fn test_error_display_invalid_property() {
        let err = TouError::InvalidProperty("voltage".to_string());
        assert_eq!(err.to_string(), "Unknown datum property: voltage");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: TouError = io_err.into();
        assert!(err.to_string().contains("denied"));
    }

    #[test]
    fn test_error_from_serde_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{invalid}").unwrap_err();
        let err: TouError = json_err.into();
        assert!(err.to_string().contains("Failed to parse JSON"));
    }
}
