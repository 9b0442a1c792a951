//! Error types for session analysis.

use std::path::PathBuf;

/// Errors that can abort the analysis of a single session.
///
/// A zero-frame session is not an error: it produces all-zero activity
/// metrics and flows through the pipeline like any other session.
#[derive(Debug)]
pub enum AnalysisError {
    /// A required input file or path does not exist.
    MissingInput(PathBuf),
    /// A voice feature bundle was empty or malformed.
    InvalidFeatures(String),
    /// An external collaborator (landmark model, feature extractor,
    /// anomaly model) failed or produced unusable output.
    ExternalModelFailure(String),
    /// Reading or writing a file failed.
    Io(std::io::Error),
    /// Encoding or decoding JSON state (report, results store, manifest) failed.
    Serialize(String),
}

impl std::fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnalysisError::MissingInput(path) => write!(f, "Missing input: {}", path.display()),
            AnalysisError::InvalidFeatures(e) => write!(f, "Invalid features: {e}"),
            AnalysisError::ExternalModelFailure(e) => write!(f, "External model failure: {e}"),
            AnalysisError::Io(e) => write!(f, "IO error: {e}"),
            AnalysisError::Serialize(e) => write!(f, "Serialize error: {e}"),
        }
    }
}

impl std::error::Error for AnalysisError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AnalysisError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for AnalysisError {
    fn from(e: std::io::Error) -> Self {
        AnalysisError::Io(e)
    }
}

impl AnalysisError {
    /// Short machine-readable kind, used in persisted failure records.
    pub fn kind(&self) -> &'static str {
        match self {
            AnalysisError::MissingInput(_) => "missing_input",
            AnalysisError::InvalidFeatures(_) => "invalid_features",
            AnalysisError::ExternalModelFailure(_) => "external_model_failure",
            AnalysisError::Io(_) => "io",
            AnalysisError::Serialize(_) => "serialize",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_the_path() {
        let err = AnalysisError::MissingInput(PathBuf::from("/tmp/missing.ndjson"));
        assert_eq!(err.to_string(), "Missing input: /tmp/missing.ndjson");
        assert_eq!(err.kind(), "missing_input");
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: AnalysisError = io.into();
        assert_eq!(err.kind(), "io");
        assert!(std::error::Error::source(&err).is_some());
    }
}
