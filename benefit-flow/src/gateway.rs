use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;

use crate::{catalog::BenefitRecord, category::Category, error::Result};

static LINE_BREAKS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\r\n]+").expect("line break pattern is valid"));

/// Classification and plan generation backed by a remote text model
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Maps a free-text health concern onto one of the fixed categories
    async fn classify(&self, user_text: &str) -> Result<Category>;

    /// Produces a short numbered action plan for availing the benefit
    async fn generate_plan(&self, benefit: &BenefitRecord) -> Result<String>;
}

pub fn classification_prompt(user_text: &str) -> String {
    let names = Category::ALL
        .iter()
        .map(|c| format!("\"{}\"", c.as_str()))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "Return ONLY the category name from [{names}] that best matches the following health issue: \"{user_text}\". Do not add any other text, formatting, or explanation."
    )
}

pub fn action_plan_prompt(benefit: &BenefitRecord) -> String {
    format!(
        "Create a simple, clear, 3-step action plan for a user to avail the health benefit titled \"{}\". The benefit covers: \"{}\". The steps should be numbered (1., 2., 3.) and concise. Do not add any introductory or concluding text.",
        benefit.title, benefit.description
    )
}

/// Strips markdown backticks, folds line breaks into single spaces and trims.
///
/// Applying it twice gives the same result as applying it once.
pub fn clean_response(raw: &str) -> String {
    let without_ticks = raw.replace('`', "");
    LINE_BREAKS
        .replace_all(&without_ticks, " ")
        .trim()
        .to_string()
}

/// Cleans a classifier answer and checks it against the category list
pub fn parse_classification(raw: &str) -> Result<Category> {
    clean_response(raw).parse()
}
