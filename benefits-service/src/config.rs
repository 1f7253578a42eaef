use benefit_flow::{BenefitsError, GeminiConfig};
use std::path::PathBuf;

/// Settings read from the environment at startup
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub gemini: GeminiConfig,
    /// Catalog JSON file; the embedded sample catalog is used when unset
    pub catalog_path: Option<PathBuf>,
    pub port: u16,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, BenefitsError> {
        let gemini = GeminiConfig::from_env()?;
        let catalog_path = std::env::var("BENEFITS_CATALOG_PATH")
            .ok()
            .map(PathBuf::from);
        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .unwrap_or(3000);

        Ok(Self {
            gemini,
            catalog_path,
            port,
        })
    }
}
