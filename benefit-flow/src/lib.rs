pub mod catalog;
pub mod category;
pub mod error;
pub mod gateway;
pub mod gemini;
pub mod plan;
pub mod runner;
pub mod session;
pub mod storage;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use catalog::{
    BenefitCatalog, BenefitRecord, EmbeddedBenefitCatalog, FileBenefitCatalog,
    InMemoryBenefitCatalog, parse_catalog,
};
pub use category::{Category, CategoryStyle};
pub use error::{BenefitsError, Result};
pub use gateway::{Gateway, clean_response};
pub use gemini::{GeminiConfig, GeminiGateway};
pub use plan::split_plan_steps;
pub use runner::BenefitsRunner;
pub use session::{BenefitsSession, SessionState, Status};
pub use storage::{InMemorySessionStorage, SessionStorage};
