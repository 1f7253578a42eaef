use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use crate::{
    catalog::BenefitRecord,
    category::Category,
    error::{BenefitsError, Result},
    gateway::Gateway,
};

/// Gateway that replays queued answers, optionally holding each call until released
#[derive(Default)]
pub(crate) struct ScriptedGateway {
    classifications: Mutex<VecDeque<Result<Category>>>,
    plans: Mutex<VecDeque<Result<String>>>,
    gate: Option<Arc<Notify>>,
    classify_calls: AtomicUsize,
    plan_calls: AtomicUsize,
}

impl ScriptedGateway {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn gated(gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    pub(crate) fn with_classification(self, answer: Result<Category>) -> Self {
        self.classifications.lock().unwrap().push_back(answer);
        self
    }

    pub(crate) fn with_plan(self, answer: Result<String>) -> Self {
        self.plans.lock().unwrap().push_back(answer);
        self
    }

    pub(crate) fn classify_calls(&self) -> usize {
        self.classify_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn plan_calls(&self) -> usize {
        self.plan_calls.load(Ordering::SeqCst)
    }

    async fn wait_for_release(&self) {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
    }
}

#[async_trait]
impl Gateway for ScriptedGateway {
    async fn classify(&self, _user_text: &str) -> Result<Category> {
        self.classify_calls.fetch_add(1, Ordering::SeqCst);
        let answer = self.classifications.lock().unwrap().pop_front();
        self.wait_for_release().await;
        answer.unwrap_or_else(|| {
            Err(BenefitsError::UpstreamUnavailable(
                "no scripted classification".to_string(),
            ))
        })
    }

    async fn generate_plan(&self, _benefit: &BenefitRecord) -> Result<String> {
        self.plan_calls.fetch_add(1, Ordering::SeqCst);
        let answer = self.plans.lock().unwrap().pop_front();
        self.wait_for_release().await;
        answer.unwrap_or_else(|| {
            Err(BenefitsError::UpstreamUnavailable(
                "no scripted plan".to_string(),
            ))
        })
    }
}

pub(crate) fn benefit(id: &str, category: Category) -> BenefitRecord {
    BenefitRecord {
        id: id.to_string(),
        category,
        title: format!("{} benefit {}", category, id),
        coverage: "Fully covered".to_string(),
        description: format!("Description of {}", id),
    }
}
