use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::Catalog;
use crate::config::NarrativeConfig;
use crate::data::{AnswerMap, AssessmentResult, Identity, Question};
use crate::narrative::{generate_report, NarrativeProvider};
use crate::scoring::score_assessment;

/// Wizard position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "step")]
pub enum Step {
    Landing,
    Register,
    Answering { index: usize },
    Scoring,
    Results,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "text")]
pub enum NarrativeStatus {
    NotStarted,
    Ready(String),
}

/// One assessment in flight. Every transition consumes the session and
/// returns the next one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub step: Step,
    pub identity: Identity,
    pub contact_email: Option<String>,
    pub answers: AnswerMap,
    pub result: Option<AssessmentResult>,
    pub narrative: NarrativeStatus,
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            step: Step::Landing,
            identity: Identity::default(),
            contact_email: None,
            answers: AnswerMap::new(),
            result: None,
            narrative: NarrativeStatus::NotStarted,
        }
    }

    /// Landing -> Register
    pub fn begin(mut self) -> Result<Self> {
        if self.step != Step::Landing {
            anyhow::bail!("Cannot begin from {:?}", self.step);
        }
        self.step = Step::Register;
        tracing::debug!(session = %self.id, "Registration started");
        Ok(self)
    }

    /// Register -> Answering(0)
    pub fn register(mut self, identity: Identity, contact_email: Option<String>) -> Result<Self> {
        if self.step != Step::Register {
            anyhow::bail!("Cannot register from {:?}", self.step);
        }
        if identity.company_name.trim().is_empty() {
            anyhow::bail!("Company name is required");
        }
        if identity.sector.trim().is_empty() {
            anyhow::bail!("Sector is required");
        }
        if let Some(email) = contact_email.as_deref() {
            if !email.contains('@') {
                anyhow::bail!("Invalid contact email: {}", email);
            }
        }

        self.identity = identity;
        self.contact_email = contact_email;
        self.step = Step::Answering { index: 0 };

        tracing::info!(session = %self.id, company = %self.identity.company_name, "Company registered");
        Ok(self)
    }

    pub fn current_question<'a>(&self, catalog: &'a Catalog) -> Option<&'a Question> {
        match self.step {
            Step::Answering { index } => catalog.questions().get(index),
            _ => None,
        }
    }

    /// Record an answer for the current question and move forward. Answering
    /// the last question scores the assessment and lands in Results.
    pub fn answer(mut self, catalog: &Catalog, value: u32) -> Result<Self> {
        let Step::Answering { index } = self.step else {
            anyhow::bail!("Not answering questions (at {:?})", self.step);
        };
        let question = catalog
            .questions()
            .get(index)
            .ok_or_else(|| anyhow::anyhow!("Question index {} out of range", index))?;

        if !question.has_option_value(value) {
            anyhow::bail!("{} is not an option for question {}", value, question.id);
        }

        self.answers.record(question.id.clone(), value);

        if index + 1 < catalog.len() {
            self.step = Step::Answering { index: index + 1 };
            return Ok(self);
        }

        self.step = Step::Scoring;
        Ok(self.finish_scoring(catalog))
    }

    fn finish_scoring(mut self, catalog: &Catalog) -> Self {
        let result = score_assessment(catalog, &self.answers, &self.identity);
        tracing::info!(
            session = %self.id,
            answered = self.answers.len(),
            overall = result.overall_score,
            "Assessment scored"
        );
        self.result = Some(result);
        self.step = Step::Results;
        self
    }

    /// Step back one question. Stays put on the first one.
    pub fn previous(mut self) -> Result<Self> {
        let Step::Answering { index } = self.step else {
            anyhow::bail!("Cannot go back from {:?}", self.step);
        };
        self.step = Step::Answering {
            index: index.saturating_sub(1),
        };
        Ok(self)
    }

    /// Discard everything and return to a fresh landing session.
    pub fn reset(self) -> Self {
        tracing::debug!(session = %self.id, "Assessment reset");
        Self::new()
    }

    /// Fill in the narrative once per result. Later calls leave it untouched.
    pub fn generate_narrative(mut self, provider: &dyn NarrativeProvider, config: &NarrativeConfig) -> Self {
        if self.narrative != NarrativeStatus::NotStarted {
            return self;
        }
        let Some(result) = self.result.as_ref() else {
            return self;
        };

        self.narrative = NarrativeStatus::Ready(generate_report(provider, result, config));
        self
    }

    pub fn narrative_text(&self) -> Option<&str> {
        match &self.narrative {
            NarrativeStatus::Ready(text) => Some(text),
            _ => None,
        }
    }

    /// 1-based progress through the catalog, as (current, total).
    pub fn progress(&self, catalog: &Catalog) -> (usize, usize) {
        let current = match self.step {
            Step::Landing | Step::Register => 0,
            Step::Answering { index } => index + 1,
            Step::Scoring | Step::Results => catalog.len(),
        };
        (current, catalog.len())
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{AnswerOption, Category, CompanySize};
    use crate::narrative::{MockNarrativeProvider, NarrativeRequest};

    fn two_question_catalog() -> Catalog {
        let options: Vec<AnswerOption> = (0..=4).map(|v| AnswerOption::new(v.to_string(), v)).collect();
        Catalog::new(
            "two",
            vec![
                Question {
                    id: "Q1".into(),
                    category: Category::Governance,
                    text: "First".into(),
                    options: options.clone(),
                    goals: vec![1, 2],
                },
                Question {
                    id: "Q2".into(),
                    category: Category::People,
                    text: "Second".into(),
                    options,
                    goals: vec![2],
                },
            ],
        )
    }

    fn registered() -> Session {
        Session::new()
            .begin()
            .unwrap()
            .register(Identity::new("Acme", "Retail", CompanySize::Micro), None)
            .unwrap()
    }

    #[test]
    fn test_linear_flow_reaches_results() {
        let catalog = two_question_catalog();

        let session = registered();
        assert_eq!(session.step, Step::Answering { index: 0 });
        assert_eq!(session.current_question(&catalog).unwrap().id, "Q1");

        let session = session.answer(&catalog, 2).unwrap();
        assert_eq!(session.step, Step::Answering { index: 1 });
        assert!(session.result.is_none());

        let session = session.answer(&catalog, 4).unwrap();
        assert_eq!(session.step, Step::Results);

        let result = session.result.as_ref().unwrap();
        assert_eq!(result.category_score(Category::Governance), 50.0);
        assert_eq!(result.category_score(Category::People), 100.0);
        assert_eq!(result.overall_score, 75.0);
        assert_eq!(result.identity.company_name, "Acme");
    }

    #[test]
    fn test_previous_and_reanswer_overwrites() {
        let catalog = two_question_catalog();

        let session = registered().answer(&catalog, 1).unwrap();
        let session = session.previous().unwrap();
        assert_eq!(session.step, Step::Answering { index: 0 });

        let session = session.answer(&catalog, 3).unwrap();
        assert_eq!(session.answers.value_of("Q1"), 3);
        assert_eq!(session.answers.len(), 1);
    }

    #[test]
    fn test_previous_on_first_question_stays() {
        let session = registered().previous().unwrap();
        assert_eq!(session.step, Step::Answering { index: 0 });
    }

    #[test]
    fn test_previous_outside_answering_fails() {
        assert!(Session::new().previous().is_err());
    }

    #[test]
    fn test_register_requires_company_and_sector() {
        let blank_name = Session::new()
            .begin()
            .unwrap()
            .register(Identity::new("  ", "Retail", CompanySize::Micro), None);
        assert!(blank_name.is_err());

        let blank_sector = Session::new()
            .begin()
            .unwrap()
            .register(Identity::new("Acme", "", CompanySize::Micro), None);
        assert!(blank_sector.is_err());
    }

    #[test]
    fn test_register_rejects_bad_email() {
        let session = Session::new().begin().unwrap().register(
            Identity::new("Acme", "Retail", CompanySize::Micro),
            Some("not-an-email".into()),
        );
        assert!(session.is_err());
    }

    #[test]
    fn test_out_of_order_transitions_fail() {
        let catalog = two_question_catalog();
        assert!(Session::new().answer(&catalog, 1).is_err());
        assert!(Session::new()
            .register(Identity::new("Acme", "Retail", CompanySize::Micro), None)
            .is_err());
        assert!(registered().begin().is_err());
    }

    #[test]
    fn test_answer_must_be_an_option_value() {
        let catalog = two_question_catalog();
        let err = registered().answer(&catalog, 9).unwrap_err();
        assert!(err.to_string().contains("not an option"));
    }

    #[test]
    fn test_answer_after_results_fails() {
        let catalog = two_question_catalog();
        let session = registered()
            .answer(&catalog, 0)
            .unwrap()
            .answer(&catalog, 0)
            .unwrap();
        assert!(session.answer(&catalog, 1).is_err());
    }

    #[test]
    fn test_narrative_generated_once() {
        let catalog = two_question_catalog();
        let provider = MockNarrativeProvider::new();
        let config = NarrativeConfig::default();

        let session = registered()
            .answer(&catalog, 2)
            .unwrap()
            .answer(&catalog, 4)
            .unwrap()
            .generate_narrative(&provider, &config)
            .generate_narrative(&provider, &config);

        assert_eq!(provider.calls(), 1);
        assert!(session.narrative_text().unwrap().contains("Acme"));
    }

    #[test]
    fn test_narrative_status_goes_straight_to_ready() {
        let catalog = two_question_catalog();
        let provider = MockNarrativeProvider::new();

        let session = registered()
            .answer(&catalog, 1)
            .unwrap()
            .answer(&catalog, 1)
            .unwrap();
        assert_eq!(session.narrative, NarrativeStatus::NotStarted);

        let session = session.generate_narrative(&provider, &NarrativeConfig::default());
        assert!(matches!(session.narrative, NarrativeStatus::Ready(_)));

        let json = serde_json::to_value(&session.narrative).unwrap();
        assert_eq!(json["status"], "ready");
        assert!(json["text"].as_str().unwrap().starts_with("# Sustainability"));
    }

    #[test]
    fn test_narrative_skipped_before_results() {
        let provider = MockNarrativeProvider::new();
        let session = registered().generate_narrative(&provider, &NarrativeConfig::default());

        assert_eq!(provider.calls(), 0);
        assert_eq!(session.narrative, NarrativeStatus::NotStarted);
    }

    #[test]
    fn test_failed_narrative_keeps_scores() {
        struct Down;
        impl NarrativeProvider for Down {
            fn name(&self) -> &str {
                "down"
            }
            fn generate_text(&self, _request: &NarrativeRequest) -> Result<String> {
                anyhow::bail!("connection reset")
            }
        }

        let catalog = two_question_catalog();
        let session = registered()
            .answer(&catalog, 4)
            .unwrap()
            .answer(&catalog, 4)
            .unwrap()
            .generate_narrative(&Down, &NarrativeConfig::default());

        assert_eq!(session.result.as_ref().unwrap().overall_score, 100.0);
        assert_eq!(
            session.narrative_text(),
            Some(crate::narrative::UNAVAILABLE_FALLBACK)
        );
    }

    #[test]
    fn test_reset_discards_everything() {
        let catalog = two_question_catalog();
        let session = registered()
            .answer(&catalog, 4)
            .unwrap()
            .answer(&catalog, 4)
            .unwrap();
        let old_id = session.id;

        let fresh = session.reset();

        assert_eq!(fresh.step, Step::Landing);
        assert!(fresh.answers.is_empty());
        assert!(fresh.result.is_none());
        assert_eq!(fresh.narrative, NarrativeStatus::NotStarted);
        assert_ne!(fresh.id, old_id);
    }

    #[test]
    fn test_progress() {
        let catalog = two_question_catalog();
        assert_eq!(Session::new().progress(&catalog), (0, 2));

        let session = registered();
        assert_eq!(session.progress(&catalog), (1, 2));

        let session = session.answer(&catalog, 1).unwrap().answer(&catalog, 1).unwrap();
        assert_eq!(session.progress(&catalog), (2, 2));
    }

    #[test]
    fn test_session_json_roundtrip() {
        let catalog = two_question_catalog();
        let session = registered().answer(&catalog, 3).unwrap();

        let json = serde_json::to_string(&session).unwrap();
        let parsed: Session = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.id, session.id);
        assert_eq!(parsed.step, Step::Answering { index: 1 });
        assert_eq!(parsed.answers, session.answers);
    }
}
