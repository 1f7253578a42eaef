use benefit_flow::{
    BenefitRecord, Category, CategoryStyle, SessionState, Status, split_plan_steps,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct ClassifyRequest {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct SelectBenefitRequest {
    pub benefit_id: String,
}

/// A benefit together with the display metadata of its category
#[derive(Debug, Serialize)]
pub struct BenefitView {
    #[serde(flatten)]
    pub benefit: BenefitRecord,
    pub style: CategoryStyle,
}

impl From<BenefitRecord> for BenefitView {
    fn from(benefit: BenefitRecord) -> Self {
        let style = benefit.category.style();
        Self { benefit, style }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session_id: String,
    pub classification_status: Status,
    pub plan_status: Status,
    pub last_error: Option<String>,
    pub classified_category: Option<Category>,
    pub matched_benefits: Vec<BenefitView>,
    pub selected_benefit: Option<BenefitView>,
    pub action_plan: Option<String>,
    pub plan_steps: Vec<String>,
}

impl SessionResponse {
    pub fn from_state(session_id: impl Into<String>, state: SessionState) -> Self {
        let plan_steps = state
            .action_plan
            .as_deref()
            .map(split_plan_steps)
            .unwrap_or_default();

        Self {
            session_id: session_id.into(),
            classification_status: state.classification_status,
            plan_status: state.plan_status,
            last_error: state.last_error,
            classified_category: state.classified_category,
            matched_benefits: state
                .matched_benefits
                .into_iter()
                .map(BenefitView::from)
                .collect(),
            selected_benefit: state.selected_benefit.map(BenefitView::from),
            action_plan: state.action_plan,
            plan_steps,
        }
    }
}
