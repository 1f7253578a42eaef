use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::BenefitsError;

/// The fixed benefit classes used both for classification and for tagging catalog records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Dental,
    Vision,
    #[serde(rename = "Mental Health")]
    MentalHealth,
    #[serde(rename = "OPD")]
    Opd,
}

impl Category {
    /// Order matches the list offered to the model in the classification prompt
    pub const ALL: [Category; 4] = [
        Category::Dental,
        Category::Opd,
        Category::Vision,
        Category::MentalHealth,
    ];

    /// Name used on the wire, in the catalog and in prompts
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Dental => "Dental",
            Category::Vision => "Vision",
            Category::MentalHealth => "Mental Health",
            Category::Opd => "OPD",
        }
    }

    /// Display metadata shared by every view that renders a benefit
    pub fn style(&self) -> CategoryStyle {
        match self {
            Category::Dental => CategoryStyle {
                icon: "🦷",
                label: "Dental",
                accent: "blue",
            },
            Category::Vision => CategoryStyle {
                icon: "👁️",
                label: "Vision",
                accent: "purple",
            },
            Category::MentalHealth => CategoryStyle {
                icon: "🧠",
                label: "Mental Health",
                accent: "green",
            },
            Category::Opd => CategoryStyle {
                icon: "🏥",
                label: "OPD",
                accent: "orange",
            },
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = BenefitsError;

    /// Exact, case-sensitive match on the wire name
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|category| category.as_str() == s)
            .ok_or_else(|| BenefitsError::InvalidClassification(s.to_string()))
    }
}

/// How a category is presented to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CategoryStyle {
    pub icon: &'static str,
    pub label: &'static str,
    pub accent: &'static str,
}
