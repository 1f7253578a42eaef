//! Per-session state machine for the two remote-backed operations.
//!
//! Classification and plan generation each cycle through
//! `Idle -> Loading -> {Succeeded, Failed}`. The state lock is only held while
//! applying a transition, never across a gateway or catalog call. Each call
//! that enters `Loading` takes a generation number; `reset` and
//! `select_benefit` advance the matching generation so that a completion from
//! a superseded call is dropped instead of overwriting newer state.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{
    catalog::{BenefitCatalog, BenefitRecord},
    category::Category,
    error::{BenefitsError, Result},
    gateway::Gateway,
};

/// Progress of one remote-backed operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Idle,
    Loading,
    Succeeded,
    Failed,
}

/// Snapshot of everything the presentation layer renders
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionState {
    pub matched_benefits: Vec<BenefitRecord>,
    pub classified_category: Option<Category>,
    pub selected_benefit: Option<BenefitRecord>,
    pub action_plan: Option<String>,
    pub classification_status: Status,
    pub plan_status: Status,
    pub last_error: Option<String>,
}

#[derive(Default)]
struct Inner {
    state: SessionState,
    classification_generation: u64,
    plan_generation: u64,
}

/// One user's classification and plan progress
pub struct BenefitsSession {
    id: String,
    gateway: Arc<dyn Gateway>,
    catalog: Arc<dyn BenefitCatalog>,
    inner: Mutex<Inner>,
}

impl BenefitsSession {
    pub fn new(
        id: impl Into<String>,
        gateway: Arc<dyn Gateway>,
        catalog: Arc<dyn BenefitCatalog>,
    ) -> Self {
        Self {
            id: id.into(),
            gateway,
            catalog,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn snapshot(&self) -> SessionState {
        self.inner.lock().await.state.clone()
    }

    /// Classifies the concern and keeps the catalog records of that category.
    ///
    /// Does nothing while a classification is already loading. On failure the
    /// previous matches are kept and the error message is recorded.
    pub async fn classify_and_fetch(&self, user_text: &str) -> SessionState {
        let generation = {
            let mut inner = self.inner.lock().await;
            if inner.state.classification_status == Status::Loading {
                debug!(session_id = %self.id, "Classification already in flight, ignoring");
                return inner.state.clone();
            }
            if user_text.trim().is_empty() {
                inner.state.classification_status = Status::Failed;
                inner.state.last_error = Some(BenefitsError::EmptyInput.to_string());
                return inner.state.clone();
            }
            inner.state.classification_status = Status::Loading;
            inner.state.last_error = None;
            inner.classification_generation += 1;
            inner.classification_generation
        };

        info!(session_id = %self.id, "Classifying health concern");
        let outcome = self.classify_and_filter(user_text).await;

        let mut inner = self.inner.lock().await;
        if inner.classification_generation != generation {
            debug!(session_id = %self.id, generation, "Dropping superseded classification result");
            return inner.state.clone();
        }

        match outcome {
            Ok((category, matched)) => {
                info!(
                    session_id = %self.id,
                    category = %category,
                    matched = matched.len(),
                    "Benefits matched"
                );
                inner.state.matched_benefits = matched;
                inner.state.classified_category = Some(category);
                inner.state.classification_status = Status::Succeeded;
            }
            Err(e) => {
                warn!(session_id = %self.id, error = %e, "Classification failed");
                inner.state.classification_status = Status::Failed;
                inner.state.last_error = Some(e.to_string());
            }
        }
        inner.state.clone()
    }

    async fn classify_and_filter(&self, user_text: &str) -> Result<(Category, Vec<BenefitRecord>)> {
        let category = self.gateway.classify(user_text).await?;
        let matched = self
            .catalog
            .fetch_all()
            .await?
            .into_iter()
            .filter(|benefit| benefit.category == category)
            .collect();
        Ok((category, matched))
    }

    /// Selects a benefit and clears any plan produced for the previous one
    pub async fn select_benefit(&self, benefit: BenefitRecord) -> SessionState {
        let mut inner = self.inner.lock().await;
        self.apply_selection(&mut inner, benefit)
    }

    /// Selects the current match with `benefit_id`.
    ///
    /// The lookup and the selection happen under one lock, so a concurrent
    /// `reset` cannot leave an unmatched benefit selected.
    pub async fn select_matched(&self, benefit_id: &str) -> Result<SessionState> {
        let mut inner = self.inner.lock().await;
        let benefit = inner
            .state
            .matched_benefits
            .iter()
            .find(|benefit| benefit.id == benefit_id)
            .cloned()
            .ok_or_else(|| BenefitsError::BenefitNotFound(benefit_id.to_string()))?;
        Ok(self.apply_selection(&mut inner, benefit))
    }

    fn apply_selection(&self, inner: &mut Inner, benefit: BenefitRecord) -> SessionState {
        info!(session_id = %self.id, benefit_id = %benefit.id, "Benefit selected");

        inner.state.selected_benefit = Some(benefit);
        inner.state.action_plan = None;
        inner.state.plan_status = Status::Idle;
        inner.state.last_error = None;
        inner.plan_generation += 1;
        inner.state.clone()
    }

    /// Generates an action plan for `benefit`.
    ///
    /// With no benefit the plan status becomes `Failed` without calling the
    /// gateway. Does nothing while a plan is already loading.
    pub async fn generate_plan(&self, benefit: Option<BenefitRecord>) -> SessionState {
        let (benefit, generation) = {
            let mut inner = self.inner.lock().await;
            let Some(benefit) = benefit else {
                warn!(session_id = %self.id, "Plan requested with no benefit selected");
                inner.state.plan_status = Status::Failed;
                inner.state.last_error = Some(BenefitsError::NoSelection.to_string());
                return inner.state.clone();
            };
            if inner.state.plan_status == Status::Loading {
                debug!(session_id = %self.id, "Plan generation already in flight, ignoring");
                return inner.state.clone();
            }
            inner.state.plan_status = Status::Loading;
            inner.state.action_plan = None;
            inner.state.last_error = None;
            inner.plan_generation += 1;
            (benefit, inner.plan_generation)
        };

        info!(session_id = %self.id, benefit_id = %benefit.id, "Generating action plan");
        let outcome = self.gateway.generate_plan(&benefit).await;

        let mut inner = self.inner.lock().await;
        if inner.plan_generation != generation {
            debug!(session_id = %self.id, generation, "Dropping superseded plan result");
            return inner.state.clone();
        }

        match outcome {
            Ok(plan) => {
                info!(session_id = %self.id, benefit_id = %benefit.id, "Action plan ready");
                inner.state.action_plan = Some(plan);
                inner.state.plan_status = Status::Succeeded;
            }
            Err(e) => {
                warn!(session_id = %self.id, error = %e, "Plan generation failed");
                inner.state.plan_status = Status::Failed;
                inner.state.last_error = Some(e.to_string());
            }
        }
        inner.state.clone()
    }

    /// Generates the plan for whatever benefit is currently selected
    pub async fn generate_selected_plan(&self) -> SessionState {
        let selected = self.inner.lock().await.state.selected_benefit.clone();
        self.generate_plan(selected).await
    }

    /// Clears the classification results; plan fields are left alone
    pub async fn reset(&self) -> SessionState {
        let mut inner = self.inner.lock().await;
        info!(session_id = %self.id, "Resetting classification");

        inner.state.matched_benefits.clear();
        inner.state.classified_category = None;
        inner.state.classification_status = Status::Idle;
        inner.state.last_error = None;
        inner.classification_generation += 1;
        inner.state.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryBenefitCatalog;
    use crate::testing::{ScriptedGateway, benefit};
    use tokio::sync::Notify;

    fn catalog() -> Arc<InMemoryBenefitCatalog> {
        Arc::new(InMemoryBenefitCatalog::new(vec![
            benefit("d1", Category::Dental),
            benefit("v1", Category::Vision),
            benefit("d2", Category::Dental),
            benefit("m1", Category::MentalHealth),
        ]))
    }

    fn session(gateway: Arc<ScriptedGateway>) -> Arc<BenefitsSession> {
        Arc::new(BenefitsSession::new("s1", gateway, catalog()))
    }

    async fn wait_for_classification_loading(session: &BenefitsSession) {
        while session.snapshot().await.classification_status != Status::Loading {
            tokio::task::yield_now().await;
        }
    }

    async fn wait_for_plan_loading(session: &BenefitsSession) {
        while session.snapshot().await.plan_status != Status::Loading {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn starts_idle_and_empty() {
        let state = session(Arc::new(ScriptedGateway::new())).snapshot().await;
        assert_eq!(state, SessionState::default());
        assert_eq!(state.classification_status, Status::Idle);
        assert_eq!(state.plan_status, Status::Idle);
    }

    #[tokio::test]
    async fn classification_keeps_matching_records_in_catalog_order() {
        let gateway =
            Arc::new(ScriptedGateway::new().with_classification(Ok(Category::Dental)));
        let state = session(gateway).classify_and_fetch("tooth pain").await;

        assert_eq!(state.classification_status, Status::Succeeded);
        assert_eq!(state.classified_category, Some(Category::Dental));
        let ids: Vec<&str> = state.matched_benefits.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["d1", "d2"]);
        assert!(state.last_error.is_none());
    }

    #[tokio::test]
    async fn classification_with_no_matches_succeeds_empty() {
        let gateway = Arc::new(ScriptedGateway::new().with_classification(Ok(Category::Opd)));
        let state = session(gateway).classify_and_fetch("fever").await;

        assert_eq!(state.classification_status, Status::Succeeded);
        assert!(state.matched_benefits.is_empty());
    }

    #[tokio::test]
    async fn failed_classification_keeps_previous_matches() {
        let gateway = Arc::new(
            ScriptedGateway::new()
                .with_classification(Ok(Category::Vision))
                .with_classification(Err(BenefitsError::InvalidClassification(
                    "Cardiology".to_string(),
                ))),
        );
        let session = session(gateway);

        let first = session.classify_and_fetch("blurry eyes").await;
        let second = session.classify_and_fetch("heart flutter").await;

        assert_eq!(second.classification_status, Status::Failed);
        assert_eq!(second.matched_benefits, first.matched_benefits);
        assert_eq!(
            second.last_error.as_deref(),
            Some("Invalid category returned by the API: \"Cardiology\"")
        );
    }

    #[tokio::test]
    async fn catalog_failure_fails_classification() {
        struct BrokenCatalog;

        #[async_trait::async_trait]
        impl BenefitCatalog for BrokenCatalog {
            async fn fetch_all(&self) -> Result<Vec<BenefitRecord>> {
                Err(BenefitsError::CatalogUnavailable("gone".to_string()))
            }
        }

        let gateway =
            Arc::new(ScriptedGateway::new().with_classification(Ok(Category::Dental)));
        let session = BenefitsSession::new("s1", gateway, Arc::new(BrokenCatalog));
        let state = session.classify_and_fetch("tooth pain").await;

        assert_eq!(state.classification_status, Status::Failed);
        assert!(state.matched_benefits.is_empty());
        assert!(state.last_error.unwrap().contains("gone"));
    }

    #[tokio::test]
    async fn blank_input_fails_without_calling_gateway() {
        let gateway = Arc::new(ScriptedGateway::new());
        let state = session(gateway.clone()).classify_and_fetch("   ").await;

        assert_eq!(state.classification_status, Status::Failed);
        assert_eq!(
            state.last_error.as_deref(),
            Some("Please describe your health concern")
        );
        assert_eq!(gateway.classify_calls(), 0);
    }

    #[tokio::test]
    async fn classification_while_loading_is_ignored() {
        let gate = Arc::new(Notify::new());
        let gateway = Arc::new(
            ScriptedGateway::gated(gate.clone()).with_classification(Ok(Category::Dental)),
        );
        let session = session(gateway.clone());

        let in_flight = tokio::spawn({
            let session = session.clone();
            async move { session.classify_and_fetch("tooth pain").await }
        });
        wait_for_classification_loading(&session).await;

        let before = session.snapshot().await;
        let during = session.classify_and_fetch("sore eyes").await;
        assert_eq!(during, before);
        assert_eq!(gateway.classify_calls(), 1);

        gate.notify_one();
        let finished = in_flight.await.unwrap();
        assert_eq!(finished.classification_status, Status::Succeeded);
        assert_eq!(finished.classified_category, Some(Category::Dental));
    }

    #[tokio::test]
    async fn reset_discards_in_flight_classification() {
        let gate = Arc::new(Notify::new());
        let gateway = Arc::new(
            ScriptedGateway::gated(gate.clone()).with_classification(Ok(Category::Dental)),
        );
        let session = session(gateway);

        let in_flight = tokio::spawn({
            let session = session.clone();
            async move { session.classify_and_fetch("tooth pain").await }
        });
        wait_for_classification_loading(&session).await;

        let after_reset = session.reset().await;
        assert_eq!(after_reset.classification_status, Status::Idle);

        gate.notify_one();
        in_flight.await.unwrap();

        let state = session.snapshot().await;
        assert_eq!(state.classification_status, Status::Idle);
        assert!(state.matched_benefits.is_empty());
        assert!(state.classified_category.is_none());
    }

    #[tokio::test]
    async fn selecting_resets_plan_state() {
        let gateway = Arc::new(
            ScriptedGateway::new().with_plan(Ok("1. Call 2. Visit 3. Claim".to_string())),
        );
        let session = session(gateway);

        let a = benefit("d1", Category::Dental);
        session.select_benefit(a.clone()).await;
        let planned = session.generate_plan(Some(a)).await;
        assert_eq!(planned.plan_status, Status::Succeeded);

        let b = benefit("d2", Category::Dental);
        let state = session.select_benefit(b.clone()).await;
        assert_eq!(state.plan_status, Status::Idle);
        assert!(state.action_plan.is_none());
        assert!(state.last_error.is_none());
        assert_eq!(state.selected_benefit, Some(b));
    }

    #[tokio::test]
    async fn plan_without_selection_reports_no_selection() {
        let gateway = Arc::new(ScriptedGateway::new());
        let session = session(gateway.clone());

        let state = session.generate_selected_plan().await;
        assert_eq!(state.plan_status, Status::Failed);
        assert_eq!(
            state.last_error.as_deref(),
            Some("Can't generate plan: no benefit selected")
        );
        assert_eq!(gateway.plan_calls(), 0);
    }

    #[tokio::test]
    async fn plan_failure_is_recorded_and_retry_succeeds() {
        let gateway = Arc::new(
            ScriptedGateway::new()
                .with_plan(Err(BenefitsError::UpstreamUnavailable("status 503".to_string())))
                .with_plan(Ok("1. Book 2. Go 3. Claim".to_string())),
        );
        let session = session(gateway);
        let chosen = benefit("m1", Category::MentalHealth);
        session.select_benefit(chosen).await;

        let failed = session.generate_selected_plan().await;
        assert_eq!(failed.plan_status, Status::Failed);
        assert!(failed.action_plan.is_none());
        assert!(failed.last_error.unwrap().contains("status 503"));

        let retried = session.generate_selected_plan().await;
        assert_eq!(retried.plan_status, Status::Succeeded);
        assert_eq!(retried.action_plan.as_deref(), Some("1. Book 2. Go 3. Claim"));
        assert!(retried.last_error.is_none());
    }

    #[tokio::test]
    async fn plan_for_previous_selection_is_discarded() {
        let gate = Arc::new(Notify::new());
        let gateway = Arc::new(
            ScriptedGateway::gated(gate.clone()).with_plan(Ok("1. Old plan".to_string())),
        );
        let session = session(gateway);
        session.select_benefit(benefit("d1", Category::Dental)).await;

        let in_flight = tokio::spawn({
            let session = session.clone();
            async move { session.generate_selected_plan().await }
        });
        wait_for_plan_loading(&session).await;

        session.select_benefit(benefit("v1", Category::Vision)).await;
        gate.notify_one();
        in_flight.await.unwrap();

        let state = session.snapshot().await;
        assert_eq!(state.plan_status, Status::Idle);
        assert!(state.action_plan.is_none());
        assert_eq!(state.selected_benefit.unwrap().id, "v1");
    }

    #[tokio::test]
    async fn plan_request_while_loading_is_ignored() {
        let gate = Arc::new(Notify::new());
        let gateway = Arc::new(
            ScriptedGateway::gated(gate.clone()).with_plan(Ok("1. a".to_string())),
        );
        let session = session(gateway.clone());
        session.select_benefit(benefit("d1", Category::Dental)).await;

        let in_flight = tokio::spawn({
            let session = session.clone();
            async move { session.generate_selected_plan().await }
        });
        wait_for_plan_loading(&session).await;

        let before = session.snapshot().await;
        let during = session.generate_selected_plan().await;
        assert_eq!(during, before);
        assert_eq!(gateway.plan_calls(), 1);

        gate.notify_one();
        let finished = in_flight.await.unwrap();
        assert_eq!(finished.plan_status, Status::Succeeded);
        assert_eq!(finished.action_plan.as_deref(), Some("1. a"));
    }

    #[tokio::test]
    async fn missing_benefit_during_in_flight_plan_does_not_discard_it() {
        let gate = Arc::new(Notify::new());
        let gateway = Arc::new(
            ScriptedGateway::gated(gate.clone()).with_plan(Ok("1. a".to_string())),
        );
        let session = session(gateway.clone());
        session.select_benefit(benefit("d1", Category::Dental)).await;

        let in_flight = tokio::spawn({
            let session = session.clone();
            async move { session.generate_selected_plan().await }
        });
        wait_for_plan_loading(&session).await;

        let rejected = session.generate_plan(None).await;
        assert_eq!(rejected.plan_status, Status::Failed);
        assert_eq!(
            rejected.last_error.as_deref(),
            Some("Can't generate plan: no benefit selected")
        );

        gate.notify_one();
        let finished = in_flight.await.unwrap();
        assert_eq!(finished.plan_status, Status::Succeeded);
        assert_eq!(finished.action_plan.as_deref(), Some("1. a"));
        assert_eq!(gateway.plan_calls(), 1);
    }

    #[tokio::test]
    async fn select_matched_only_accepts_current_matches() {
        let gateway =
            Arc::new(ScriptedGateway::new().with_classification(Ok(Category::Dental)));
        let session = session(gateway);
        session.classify_and_fetch("tooth pain").await;

        assert_eq!(
            session.select_matched("v1").await.unwrap_err(),
            BenefitsError::BenefitNotFound("v1".to_string())
        );

        let selected = session.select_matched("d2").await.unwrap();
        assert_eq!(selected.selected_benefit.unwrap().id, "d2");
        assert_eq!(selected.plan_status, Status::Idle);

        session.reset().await;
        assert_eq!(
            session.select_matched("d1").await.unwrap_err(),
            BenefitsError::BenefitNotFound("d1".to_string())
        );
        assert_eq!(session.snapshot().await.selected_benefit.unwrap().id, "d2");
    }

    #[tokio::test]
    async fn reset_leaves_plan_fields_alone() {
        let gateway = Arc::new(
            ScriptedGateway::new()
                .with_classification(Ok(Category::Dental))
                .with_plan(Ok("1. Go".to_string())),
        );
        let session = session(gateway);
        session.classify_and_fetch("tooth pain").await;
        session.select_benefit(benefit("d1", Category::Dental)).await;
        session.generate_selected_plan().await;

        let state = session.reset().await;
        assert!(state.matched_benefits.is_empty());
        assert_eq!(state.classification_status, Status::Idle);
        assert_eq!(state.plan_status, Status::Succeeded);
        assert_eq!(state.action_plan.as_deref(), Some("1. Go"));
        assert!(state.selected_benefit.is_some());
    }
}
