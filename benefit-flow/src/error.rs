use thiserror::Error;

/// Errors produced by the benefit flow
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BenefitsError {
    /// Transport failure, non-success status or malformed body from the remote model
    #[error("Text generation service unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The remote model answered with something outside the category list
    #[error("Invalid category returned by the API: {0:?}")]
    InvalidClassification(String),

    #[error("Could not fetch the benefits data: {0}")]
    CatalogUnavailable(String),

    #[error("Can't generate plan: no benefit selected")]
    NoSelection,

    #[error("Please describe your health concern")]
    EmptyInput,

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Benefit not found among matched benefits: {0}")]
    BenefitNotFound(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

pub type Result<T> = std::result::Result<T, BenefitsError>;
