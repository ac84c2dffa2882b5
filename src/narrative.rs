use anyhow::{Context, Result};
use serde_json::Value;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::catalog::goal;
use crate::config::{NarrativeConfig, ProviderKind};
use crate::data::{AssessmentResult, Category};
use crate::scoring::{ranked_goals, round_percent};

pub const CONFIG_FALLBACK: &str =
    "Configuration error: no API credential is available for the report generator.";
pub const UNAVAILABLE_FALLBACK: &str = "The strategic analysis engine is busy right now. \
     Your quantitative results above are complete and can be exported.";
pub const EMPTY_FALLBACK: &str = "Report generated. See your indicators in the panel above.";

/// One text generation call
#[derive(Debug, Clone, PartialEq)]
pub struct NarrativeRequest {
    pub prompt: String,
    pub temperature: f32,
    pub thinking_budget: u32,
}

/// Trait for text generation backends
pub trait NarrativeProvider: Send + Sync {
    fn name(&self) -> &str;

    /// False when a call could not possibly succeed, e.g. no credential.
    fn is_configured(&self) -> bool {
        true
    }

    fn generate_text(&self, request: &NarrativeRequest) -> Result<String>;
}

/// Deterministic provider for tests and offline runs
pub struct MockNarrativeProvider {
    calls: AtomicU32,
}

impl MockNarrativeProvider {
    pub fn new() -> Self {
        Self {
            calls: AtomicU32::new(0),
        }
    }

    #[cfg(test)]
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockNarrativeProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl NarrativeProvider for MockNarrativeProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn generate_text(&self, request: &NarrativeRequest) -> Result<String> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let first_line = request
            .prompt
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or("");

        Ok(format!(
            "# Sustainability Strategy Diagnosis\n\n\
             ## 1. Maturity Analysis\nMock analysis #{} for: {}\n\n\
             ## 2. Key Strengths\nMock strengths.\n\n\
             ## 3. Priority Roadmap\n1. Self-consumption solar.\n2. Circular economy.\n3. Local equality plan.\n\n\
             ## 4. Conclusion\nMock conclusion.\n",
            call + 1,
            first_line
        ))
    }
}

/// Google Generative Language API over blocking HTTP
pub struct GeminiProvider {
    client: reqwest::blocking::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl GeminiProvider {
    pub fn new(config: &NarrativeConfig) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            api_key: config.api_key(),
        }
    }

    #[cfg(test)]
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

impl NarrativeProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn generate_text(&self, request: &NarrativeRequest) -> Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("No API key configured"))?;

        let body = gemini_request_body(request);
        let endpoint = self.endpoint();

        tracing::debug!(model = %self.model, "Calling text generation API");

        let response = self
            .client
            .post(&endpoint)
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .with_context(|| format!("Request to {} failed", endpoint))?
            .error_for_status()
            .context("Text generation API returned an error status")?;

        let payload: Value = response
            .json()
            .context("Failed to decode text generation response")?;

        Ok(extract_candidate_text(&payload).unwrap_or_default())
    }
}

fn gemini_request_body(request: &NarrativeRequest) -> Value {
    serde_json::json!({
        "contents": [
            { "role": "user", "parts": [{ "text": request.prompt }] }
        ],
        "generationConfig": {
            "temperature": request.temperature,
            "thinkingConfig": { "thinkingBudget": request.thinking_budget }
        }
    })
}

/// Concatenate the text parts of the first candidate, skipping thought parts.
fn extract_candidate_text(payload: &Value) -> Option<String> {
    let parts = payload
        .get("candidates")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("content"))
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.as_array())?;

    let text: String = parts
        .iter()
        .filter(|p| !p.get("thought").and_then(|t| t.as_bool()).unwrap_or(false))
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect();

    Some(text)
}

pub fn build_provider(config: &NarrativeConfig) -> Box<dyn NarrativeProvider> {
    match config.provider {
        ProviderKind::Mock => Box::new(MockNarrativeProvider::new()),
        ProviderKind::Gemini => Box::new(GeminiProvider::new(config)),
    }
}

/// Prompt asking for a four section markdown report on the scores.
pub fn build_report_prompt(result: &AssessmentResult, language: &str) -> String {
    let scores_text = Category::ALL
        .iter()
        .map(|c| format!("- **{}**: {:.0}%", c.label(), round_percent(result.category_score(*c))))
        .collect::<Vec<_>>()
        .join("\n");

    let goals_text = ranked_goals(result)
        .into_iter()
        .take(3)
        .filter_map(|(id, total)| goal(id).map(|g| format!("SDG {} {} ({})", g.id, g.name, total)))
        .collect::<Vec<_>>();
    let goals_line = if goals_text.is_empty() {
        "none yet".to_string()
    } else {
        goals_text.join(", ")
    };

    format!(
        "Strategic SDG positioning report for \"{company}\".\n\
         \n\
         You lead the sustainability office of a regional business confederation.\n\
         \n\
         CONTEXT:\n\
         - Sector: {sector}\n\
         - Size: {size}\n\
         - Framework: 2030 Agenda and regional climate change law.\n\
         \n\
         SELF-ASSESSMENT RESULTS:\n\
         {scores}\n\
         Overall maturity index: {overall:.0}%\n\
         Most aligned goals: {goals}\n\
         \n\
         WRITING INSTRUCTIONS:\n\
         1. Institutional, executive, technical tone. Write in language code \"{language}\".\n\
         2. Do not mention that the text was generated.\n\
         3. Use these markdown sections:\n\
         # SUSTAINABILITY STRATEGY DIAGNOSIS\n\
         ## 1. Maturity Analysis\n\
         ## 2. Key Strengths\n\
         ## 3. Priority Roadmap (three concrete, realistic actions)\n\
         ## 4. Conclusion\n",
        company = result.identity.company_name,
        sector = result.identity.sector,
        size = result.identity.size.label(),
        scores = scores_text,
        overall = round_percent(result.overall_score),
        goals = goals_line,
        language = language,
    )
}

/// Produce displayable report text. Never fails: problems become fallback text.
pub fn generate_report(
    provider: &dyn NarrativeProvider,
    result: &AssessmentResult,
    config: &NarrativeConfig,
) -> String {
    if !provider.is_configured() {
        tracing::warn!(provider = provider.name(), "Narrative provider not configured");
        return CONFIG_FALLBACK.to_string();
    }

    let request = NarrativeRequest {
        prompt: build_report_prompt(result, &config.language),
        temperature: config.temperature,
        thinking_budget: config.thinking_budget,
    };

    match provider.generate_text(&request) {
        Ok(text) if text.trim().is_empty() => {
            tracing::warn!(provider = provider.name(), "Narrative provider returned no text");
            EMPTY_FALLBACK.to_string()
        }
        Ok(text) => {
            tracing::info!(provider = provider.name(), chars = text.len(), "Generated narrative report");
            text
        }
        Err(e) => {
            tracing::error!(provider = provider.name(), error = %format!("{:#}", e), "Narrative generation failed");
            UNAVAILABLE_FALLBACK.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::data::{AnswerMap, CompanySize, Identity};
    use crate::scoring::score_assessment;

    struct FailingProvider;

    impl NarrativeProvider for FailingProvider {
        fn name(&self) -> &str {
            "failing"
        }

        fn generate_text(&self, _request: &NarrativeRequest) -> Result<String> {
            anyhow::bail!("quota exceeded")
        }
    }

    struct EmptyProvider;

    impl NarrativeProvider for EmptyProvider {
        fn name(&self) -> &str {
            "empty"
        }

        fn generate_text(&self, _request: &NarrativeRequest) -> Result<String> {
            Ok("   \n".into())
        }
    }

    fn make_result() -> AssessmentResult {
        let answers = AnswerMap::new()
            .with("G1", 4)
            .with("E1", 3)
            .with("E2", 3)
            .with("M1", 2);
        score_assessment(
            &Catalog::standard(),
            &answers,
            &Identity::new("Bodega Teide", "Agrifood", CompanySize::Small),
        )
    }

    #[test]
    fn test_prompt_contains_identity_and_rounded_scores() {
        let result = make_result();
        let prompt = build_report_prompt(&result, "es");

        assert!(prompt.contains("\"Bodega Teide\""));
        assert!(prompt.contains("Sector: Agrifood"));
        assert!(prompt.contains("Size: Small (10-49)"));
        assert!(prompt.contains("- **Strategy & Governance**: 50%"));
        assert!(prompt.contains("- **Planet & Climate**: 75%"));
        assert!(prompt.contains("Overall maturity index: 30%"));
        assert!(prompt.contains("language code \"es\""));
        assert!(prompt.contains("## 3. Priority Roadmap"));
    }

    #[test]
    fn test_prompt_rounds_half_percentages_up() {
        let answers = AnswerMap::new()
            .with("G1", 1)
            .with("P1", 4)
            .with("P2", 4)
            .with("V1", 4)
            .with("V2", 4)
            .with("E1", 4);
        let result = score_assessment(&Catalog::standard(), &answers, &Identity::default());

        let prompt = build_report_prompt(&result, "es");

        assert!(prompt.contains("- **Strategy & Governance**: 13%"));
        assert!(prompt.contains("Overall maturity index: 53%"));
    }

    #[test]
    fn test_prompt_lists_top_goals() {
        let prompt = build_report_prompt(&make_result(), "en");
        // Goal 12 collects G1 + E2 + M1 = 9
        assert!(prompt.contains("SDG 12 Responsible consumption and production (9)"));
        assert!(prompt.contains("SDG 8 Decent work and economic growth (4)"));
    }

    #[test]
    fn test_prompt_without_answers() {
        let result = score_assessment(&Catalog::standard(), &AnswerMap::new(), &Identity::default());
        let prompt = build_report_prompt(&result, "en");
        assert!(prompt.contains("Most aligned goals: none yet"));
        assert!(prompt.contains("Overall maturity index: 0%"));
    }

    #[test]
    fn test_generate_report_mock_provider() {
        let provider = MockNarrativeProvider::new();
        let report = generate_report(&provider, &make_result(), &NarrativeConfig::default());

        assert!(report.starts_with("# Sustainability Strategy Diagnosis"));
        assert!(report.contains("Bodega Teide"));
        assert_eq!(provider.calls(), 1);
    }

    #[test]
    fn test_generate_report_provider_error_falls_back() {
        let report = generate_report(&FailingProvider, &make_result(), &NarrativeConfig::default());
        assert_eq!(report, UNAVAILABLE_FALLBACK);
    }

    #[test]
    fn test_generate_report_empty_text_falls_back() {
        let report = generate_report(&EmptyProvider, &make_result(), &NarrativeConfig::default());
        assert_eq!(report, EMPTY_FALLBACK);
    }

    #[test]
    fn test_generate_report_unconfigured_skips_call() {
        let config = NarrativeConfig {
            base_url: "http://127.0.0.1:9".into(),
            ..NarrativeConfig::default()
        };
        let provider = GeminiProvider::new(&config).with_api_key(None);

        assert!(!provider.is_configured());
        let report = generate_report(&provider, &make_result(), &NarrativeConfig::default());
        assert_eq!(report, CONFIG_FALLBACK);
    }

    #[test]
    fn test_gemini_unreachable_falls_back() {
        let config = NarrativeConfig {
            base_url: "http://127.0.0.1:9".into(),
            ..NarrativeConfig::default()
        };
        let provider = GeminiProvider::new(&config).with_api_key(Some("test-key".into()));

        let report = generate_report(&provider, &make_result(), &NarrativeConfig::default());
        assert_eq!(report, UNAVAILABLE_FALLBACK);
    }

    #[test]
    fn test_gemini_endpoint() {
        let config = NarrativeConfig {
            model: "gemini-x".into(),
            base_url: "http://localhost:8080/v1beta/".into(),
            ..NarrativeConfig::default()
        };
        let provider = GeminiProvider::new(&config);
        assert_eq!(
            provider.endpoint(),
            "http://localhost:8080/v1beta/models/gemini-x:generateContent"
        );
    }

    #[test]
    fn test_gemini_request_body() {
        let request = NarrativeRequest {
            prompt: "hello".into(),
            temperature: 0.5,
            thinking_budget: 2000,
        };

        let body = gemini_request_body(&request);

        assert_eq!(body["contents"][0]["parts"][0]["text"], "hello");
        assert_eq!(body["generationConfig"]["temperature"], 0.5);
        assert_eq!(body["generationConfig"]["thinkingConfig"]["thinkingBudget"], 2000);
    }

    #[test]
    fn test_extract_candidate_text_skips_thoughts() {
        let payload = serde_json::json!({
            "candidates": [{
                "content": {
                    "parts": [
                        { "text": "planning...", "thought": true },
                        { "text": "# Report\n" },
                        { "text": "Body" }
                    ]
                }
            }]
        });

        assert_eq!(extract_candidate_text(&payload), Some("# Report\nBody".into()));
    }

    #[test]
    fn test_extract_candidate_text_missing_candidates() {
        let payload = serde_json::json!({ "promptFeedback": { "blockReason": "SAFETY" } });
        assert_eq!(extract_candidate_text(&payload), None);
    }

    #[test]
    fn test_build_provider_by_kind() {
        let mock = build_provider(&NarrativeConfig::default());
        assert_eq!(mock.name(), "mock");

        let gemini = build_provider(&NarrativeConfig {
            provider: ProviderKind::Gemini,
            ..NarrativeConfig::default()
        });
        assert_eq!(gemini.name(), "gemini");
    }
}
