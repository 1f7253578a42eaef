//! BenefitsRunner – resolves a session by id and forwards one intent to it.
//!
//! HTTP handlers only know a session id. The runner owns the shared gateway,
//! catalog and session storage, creates sessions, and turns unknown ids into
//! [`BenefitsError::SessionNotFound`]. Orchestration failures never surface
//! here: they are part of the returned [`SessionState`].
//!
//! ```rust,ignore
//! // At startup
//! let runner = BenefitsRunner::new(gateway, catalog, storage);
//!
//! // In request handlers
//! let session = runner.start_session().await?;
//! let state = runner.classify(session.id(), "my tooth hurts").await?;
//! ```

use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::{
    catalog::BenefitCatalog,
    error::{BenefitsError, Result},
    gateway::Gateway,
    session::{BenefitsSession, SessionState},
    storage::SessionStorage,
};

/// Entry point for presentation layers that address sessions by id
#[derive(Clone)]
pub struct BenefitsRunner {
    gateway: Arc<dyn Gateway>,
    catalog: Arc<dyn BenefitCatalog>,
    storage: Arc<dyn SessionStorage>,
}

impl BenefitsRunner {
    pub fn new(
        gateway: Arc<dyn Gateway>,
        catalog: Arc<dyn BenefitCatalog>,
        storage: Arc<dyn SessionStorage>,
    ) -> Self {
        Self {
            gateway,
            catalog,
            storage,
        }
    }

    /// Creates and stores a fresh session
    pub async fn start_session(&self) -> Result<Arc<BenefitsSession>> {
        let session = Arc::new(BenefitsSession::new(
            Uuid::new_v4().to_string(),
            self.gateway.clone(),
            self.catalog.clone(),
        ));
        self.storage.save(session.clone()).await?;
        info!(session_id = %session.id(), "Session created");
        Ok(session)
    }

    pub async fn session(&self, session_id: &str) -> Result<Arc<BenefitsSession>> {
        self.storage
            .get(session_id)
            .await?
            .ok_or_else(|| BenefitsError::SessionNotFound(session_id.to_string()))
    }

    pub async fn snapshot(&self, session_id: &str) -> Result<SessionState> {
        Ok(self.session(session_id).await?.snapshot().await)
    }

    pub async fn classify(&self, session_id: &str, user_text: &str) -> Result<SessionState> {
        let session = self.session(session_id).await?;
        Ok(session.classify_and_fetch(user_text).await)
    }

    /// Selects one of the benefits matched by the last classification
    pub async fn select_benefit_by_id(
        &self,
        session_id: &str,
        benefit_id: &str,
    ) -> Result<SessionState> {
        self.session(session_id).await?.select_matched(benefit_id).await
    }

    pub async fn generate_selected_plan(&self, session_id: &str) -> Result<SessionState> {
        let session = self.session(session_id).await?;
        Ok(session.generate_selected_plan().await)
    }

    pub async fn reset(&self, session_id: &str) -> Result<SessionState> {
        let session = self.session(session_id).await?;
        Ok(session.reset().await)
    }

    pub async fn end_session(&self, session_id: &str) -> Result<()> {
        self.session(session_id).await?;
        self.storage.delete(session_id).await?;
        info!(session_id = %session_id, "Session ended");
        Ok(())
    }
}
