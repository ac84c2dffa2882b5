use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// SDG identifier, 1 through 17.
pub type GoalId = u8;

pub const GOAL_COUNT: GoalId = 17;

/// Every goal id in the fixed goal set, in ascending order.
pub fn goal_ids() -> impl Iterator<Item = GoalId> {
    1..=GOAL_COUNT
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Governance,
    People,
    ValueChain,
    Environment,
    Community,
    Measurement,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Governance,
        Category::People,
        Category::ValueChain,
        Category::Environment,
        Category::Community,
        Category::Measurement,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Category::Governance => "Strategy & Governance",
            Category::People => "People & Talent",
            Category::ValueChain => "Operations & Supply Chain",
            Category::Environment => "Planet & Climate",
            Category::Community => "Local Social Impact",
            Category::Measurement => "Reporting & Transparency",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CompanySize {
    SelfEmployed,
    #[default]
    Micro,
    Small,
    Medium,
}

impl CompanySize {
    pub fn label(&self) -> &'static str {
        match self {
            CompanySize::SelfEmployed => "Self-employed / Professional",
            CompanySize::Micro => "Micro (1-9)",
            CompanySize::Small => "Small (10-49)",
            CompanySize::Medium => "Medium (50-249)",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().replace('-', "_").as_str() {
            "self_employed" | "selfemployed" | "freelance" => Some(CompanySize::SelfEmployed),
            "micro" => Some(CompanySize::Micro),
            "small" => Some(CompanySize::Small),
            "medium" => Some(CompanySize::Medium),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnswerOption {
    pub label: String,
    pub value: u32,
}

impl AnswerOption {
    pub fn new(label: impl Into<String>, value: u32) -> Self {
        Self {
            label: label.into(),
            value,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Question {
    pub id: String,
    pub category: Category,
    pub text: String,
    pub options: Vec<AnswerOption>,
    pub goals: Vec<GoalId>,
}

impl Question {
    pub fn max_value(&self) -> u32 {
        self.options.iter().map(|o| o.value).max().unwrap_or(0)
    }

    pub fn has_option_value(&self, value: u32) -> bool {
        self.options.iter().any(|o| o.value == value)
    }

    pub fn option_label(&self, value: u32) -> Option<&str> {
        self.options
            .iter()
            .find(|o| o.value == value)
            .map(|o| o.label.as_str())
    }
}

/// Company fields copied verbatim into a result. Never validated by scoring.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Identity {
    pub company_name: String,
    pub sector: String,
    pub size: CompanySize,
}

impl Identity {
    pub fn new(company_name: impl Into<String>, sector: impl Into<String>, size: CompanySize) -> Self {
        Self {
            company_name: company_name.into(),
            sector: sector.into(),
            size,
        }
    }
}

/// Sparse question id -> chosen option value.
///
/// A missing entry reads as 0, the same as an explicit lowest-maturity
/// answer. Re-answering a question overwrites its entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(transparent)]
pub struct AnswerMap(BTreeMap<String, u32>);

impl AnswerMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, question_id: impl Into<String>, value: u32) {
        self.0.insert(question_id.into(), value);
    }

    #[cfg(test)]
    pub fn with(mut self, question_id: impl Into<String>, value: u32) -> Self {
        self.record(question_id, value);
        self
    }

    pub fn value_of(&self, question_id: &str) -> u32 {
        self.0.get(question_id).copied().unwrap_or(0)
    }

    pub fn is_answered(&self, question_id: &str) -> bool {
        self.0.contains_key(question_id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl FromIterator<(String, u32)> for AnswerMap {
    fn from_iter<I: IntoIterator<Item = (String, u32)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Immutable snapshot produced once per completed questionnaire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssessmentResult {
    pub identity: Identity,
    pub category_scores: BTreeMap<Category, f64>,
    pub overall_score: f64,
    pub goal_alignment: BTreeMap<GoalId, u64>,
}

impl AssessmentResult {
    pub fn category_score(&self, category: Category) -> f64 {
        self.category_scores.get(&category).copied().unwrap_or(0.0)
    }

    #[cfg(test)]
    pub fn goal_alignment(&self, goal: GoalId) -> u64 {
        self.goal_alignment.get(&goal).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_answer_map_missing_reads_zero() {
        let answers = AnswerMap::new().with("G1", 3);

        assert_eq!(answers.value_of("G1"), 3);
        assert_eq!(answers.value_of("G2"), 0);
        assert!(answers.is_answered("G1"));
        assert!(!answers.is_answered("G2"));
    }

    #[test]
    fn test_answer_map_overwrites_on_reanswer() {
        let mut answers = AnswerMap::new();
        answers.record("P1", 1);
        answers.record("P1", 4);

        assert_eq!(answers.len(), 1);
        assert_eq!(answers.value_of("P1"), 4);
    }

    #[test]
    fn test_answer_map_json_is_plain_object() {
        let answers = AnswerMap::new().with("E1", 2).with("C1", 0);

        let json = serde_json::to_value(&answers).unwrap();
        assert_eq!(json, serde_json::json!({"C1": 0, "E1": 2}));

        let parsed: AnswerMap = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, answers);
    }

    #[test]
    fn test_answer_map_rejects_negative_values() {
        let parsed = serde_json::from_value::<AnswerMap>(serde_json::json!({"G1": -1}));
        assert!(parsed.is_err());
    }

    #[test]
    fn test_category_serde_snake_case() {
        let json = serde_json::to_string(&Category::ValueChain).unwrap();
        assert_eq!(json, "\"value_chain\"");
    }

    #[test]
    fn test_company_size_parse() {
        assert_eq!(CompanySize::parse("Micro"), Some(CompanySize::Micro));
        assert_eq!(CompanySize::parse("self-employed"), Some(CompanySize::SelfEmployed));
        assert_eq!(CompanySize::parse(" medium "), Some(CompanySize::Medium));
        assert_eq!(CompanySize::parse("large"), None);
    }

    #[test]
    fn test_question_option_helpers() {
        let question = Question {
            id: "Q1".into(),
            category: Category::People,
            text: "Training programmes?".into(),
            options: vec![AnswerOption::new("No", 0), AnswerOption::new("Yes", 5)],
            goals: vec![4, 8],
        };

        assert_eq!(question.max_value(), 5);
        assert!(question.has_option_value(5));
        assert!(!question.has_option_value(3));
        assert_eq!(question.option_label(0), Some("No"));
    }

    #[test]
    fn test_goal_ids_cover_fixed_set() {
        let ids: Vec<_> = goal_ids().collect();
        assert_eq!(ids.len(), 17);
        assert_eq!(ids.first(), Some(&1));
        assert_eq!(ids.last(), Some(&17));
    }
}
