use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationKind {
    Knowledge,
    Prompt,
    Context,
    Format,
    Intent,
}

impl RecommendationKind {
    pub fn title(&self) -> &'static str {
        match self {
            RecommendationKind::Knowledge => "Update Knowledge Base",
            RecommendationKind::Prompt => "Enhance System Prompt",
            RecommendationKind::Context => "Optimize Context Window",
            RecommendationKind::Format => "Refine Response Format",
            RecommendationKind::Intent => "Add Intent Recognition",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            RecommendationKind::Knowledge => {
                "Add or update information in your knowledge base to improve response accuracy."
            }
            RecommendationKind::Prompt => {
                "Modify system instructions to encourage more comprehensive and accurate answers."
            }
            RecommendationKind::Context => {
                "Reduce context length or optimize retrieval to improve response times."
            }
            RecommendationKind::Format => {
                "Add formatting guidelines to structure responses according to expectations."
            }
            RecommendationKind::Intent => {
                "Create intent mappings to handle different question phrasings."
            }
        }
    }

    pub fn action_label(&self) -> &'static str {
        match self {
            RecommendationKind::Knowledge => "Go to Knowledge Base",
            RecommendationKind::Prompt => "Edit System Prompt",
            RecommendationKind::Context => "Agent Settings",
            RecommendationKind::Format => "Edit Format Rules",
            RecommendationKind::Intent => "Manage Intents",
        }
    }
}

/// Ordered most urgent first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: RecommendationKind,
    pub title: String,
    pub priority: Priority,
    pub description: String,
    pub action_label: String,
}

/// Failed rows grouped by the fix that would help them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationGroup {
    #[serde(rename = "type")]
    pub kind: RecommendationKind,
    pub label: String,
    pub description: String,
    pub priority: Priority,
    pub count: usize,
    pub row_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub total_run: usize,
    pub passed: usize,
    /// Percentage of run rows that passed.
    pub efficiency_score: u8,
    pub average_accuracy: u8,
    pub average_latency: f64,
}

impl RunSummary {
    pub fn meets_target(&self, target: u8) -> bool {
        self.efficiency_score >= target
    }
}
