use thiserror::Error;

/// A configured column or header could not be located in the grid.
/// Reported as a configuration problem, never as a parse failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
    #[error("header row with column '{0}' was not found in the worksheet")]
    HeaderNotFound(String),

    #[error("column '{0}' was not found in the header row")]
    ColumnNotFound(String),
}

/// Everything that can go wrong between "dashboard requested" and
/// "extraction finished". The dashboard endpoint turns any of these into a
/// complete zeroed result plus this error's message; none of them escape
/// as a failed response.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Google credentials are not configured")]
    CredentialsNotConfigured,

    #[error("worksheet '{0}' was not found in the spreadsheet")]
    WorksheetNotFound(String),

    #[error(transparent)]
    Mapping(#[from] MappingError),

    #[error("{0}")]
    Unexpected(String),
}
