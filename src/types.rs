//! Error types for the converter backend
//!
//! Every failure the pipeline or HTTP surface can produce maps to a stable
//! status code and a client-safe message. Internal detail stays in the logs.

use hyper::StatusCode;

/// Main error type for conversion operations
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    /// Missing/malformed request input (no file, wrong extension, bad JSON)
    #[error("{0}")]
    InvalidInput(String),

    /// Request carried no license key
    #[error("Missing license key.")]
    MissingLicense,

    /// Uploaded bytes are not a valid zip container
    #[error("The uploaded file is corrupted or isn't a valid .brushset.")]
    CorruptArchive,

    /// No image in the container met the minimum-resolution floor
    #[error("No valid stamps (min {0}x{0}) were found in the brushset.")]
    EmptyResult(u32),

    /// License gate answered: key invalid or out of credits
    #[error("{0}")]
    LicenseDenied(String),

    /// License gate unreachable or returned garbage
    #[error("Failed to update credits due to a license service error.")]
    LicenseUnavailable(String),

    /// Delivery sink could not store the output pack
    #[error("Failed to store the converted pack.")]
    DeliveryFailed(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ConvertError {
    /// Convert error to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::MissingLicense => StatusCode::UNAUTHORIZED,
            Self::CorruptArchive => StatusCode::BAD_REQUEST,
            Self::EmptyResult(_) => StatusCode::BAD_REQUEST,
            Self::LicenseDenied(_) => StatusCode::FORBIDDEN,
            Self::LicenseUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::DeliveryFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing message for the JSON error envelope.
    ///
    /// Server-side variants hide their cause; the full detail is logged
    /// where the error is raised.
    pub fn client_message(&self) -> String {
        match self {
            Self::Database(_) => "A server error occurred.".to_string(),
            Self::Internal(_) => "A critical error occurred during conversion.".to_string(),
            other => other.to_string(),
        }
    }
}

// From conversions for errors that flow through `?` unannotated; everything
// else is wrapped at the call site with context.

impl From<zip::result::ZipError> for ConvertError {
    fn from(_err: zip::result::ZipError) -> Self {
        Self::CorruptArchive
    }
}

impl From<multer::Error> for ConvertError {
    fn from(err: multer::Error) -> Self {
        Self::InvalidInput(format!("Malformed multipart body: {}", err))
    }
}

/// Result type alias for converter operations
pub type Result<T> = std::result::Result<T, ConvertError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_taxonomy() {
        assert_eq!(
            ConvertError::InvalidInput("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ConvertError::MissingLicense.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ConvertError::CorruptArchive.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ConvertError::EmptyResult(1024).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ConvertError::LicenseDenied("no credits".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ConvertError::DeliveryFailed("disk full".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn internal_detail_not_leaked() {
        let err = ConvertError::Database("connection refused to mongodb://secret-host".into());
        assert!(!err.client_message().contains("secret-host"));

        let err = ConvertError::Internal("panicked at src/foo.rs:42".into());
        assert!(!err.client_message().contains("foo.rs"));
    }
}
