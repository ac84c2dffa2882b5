use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::data::{goal_ids, AnswerOption, Category, GoalId, Question, GOAL_COUNT};

/// Ordered, read-only questionnaire definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Catalog {
    pub name: String,
    pub questions: Vec<Question>,
}

impl Catalog {
    pub fn new(name: impl Into<String>, questions: Vec<Question>) -> Self {
        Self {
            name: name.into(),
            questions,
        }
    }

    /// The built-in 10 question catalog on the 0-4 maturity scale.
    pub fn standard() -> Self {
        let q = |id: &str, category: Category, text: &str, goals: &[GoalId]| Question {
            id: id.into(),
            category,
            text: text.into(),
            options: standard_options(),
            goals: goals.to_vec(),
        };

        Self::new(
            "standard",
            vec![
                q(
                    "G1",
                    Category::Governance,
                    "Are the company's mission and vision formally aligned with sustainability?",
                    &[8, 12, 17],
                ),
                q(
                    "G2",
                    Category::Governance,
                    "Is there a person or committee responsible for managing sustainability?",
                    &[16, 17],
                ),
                q(
                    "P1",
                    Category::People,
                    "Are there active policies ensuring gender equality and non-discrimination?",
                    &[5, 10],
                ),
                q(
                    "P2",
                    Category::People,
                    "Are there training and professional development programmes for staff?",
                    &[4, 8],
                ),
                q(
                    "V1",
                    Category::ValueChain,
                    "Does the company prioritise hiring local suppliers?",
                    &[8, 11],
                ),
                q(
                    "V2",
                    Category::ValueChain,
                    "Are suppliers assessed against social or environmental criteria?",
                    &[12, 17],
                ),
                q(
                    "E1",
                    Category::Environment,
                    "Are there actions to reduce energy use or to use renewable sources?",
                    &[7, 13],
                ),
                q(
                    "E2",
                    Category::Environment,
                    "Is there a waste management system that promotes the circular economy?",
                    &[12, 14, 15],
                ),
                q(
                    "C1",
                    Category::Community,
                    "Does the company actively collaborate with local social organisations or projects?",
                    &[1, 11, 17],
                ),
                q(
                    "M1",
                    Category::Measurement,
                    "Are non-financial (social and environmental) impacts measured and reported yearly?",
                    &[12, 16],
                ),
            ],
        )
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn question(&self, id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn questions_in(&self, category: Category) -> impl Iterator<Item = &Question> {
        self.questions.iter().filter(move |q| q.category == category)
    }

    /// Highest option value anywhere in the catalog, 0 when there are no options.
    pub fn max_option_value(&self) -> u32 {
        self.questions.iter().map(Question::max_value).max().unwrap_or(0)
    }

    /// Check the preconditions scoring relies on. Collects every violation.
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if self.is_empty() {
            errors.push("catalog has no questions".to_string());
        }

        let mut seen = HashSet::new();
        let catalog_max = self.max_option_value();

        for question in &self.questions {
            if question.id.trim().is_empty() {
                errors.push("question with empty id".to_string());
            }
            if !seen.insert(question.id.as_str()) {
                errors.push(format!("duplicate question id: {}", question.id));
            }
            if question.options.is_empty() {
                errors.push(format!("{}: no options", question.id));
            } else if question.max_value() != catalog_max {
                errors.push(format!(
                    "{}: max option value {} differs from catalog max {}",
                    question.id,
                    question.max_value(),
                    catalog_max
                ));
            }
            for goal in &question.goals {
                if !(1..=GOAL_COUNT).contains(goal) {
                    errors.push(format!("{}: goal {} outside 1-{}", question.id, goal, GOAL_COUNT));
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            anyhow::bail!("Invalid catalog '{}':\n  {}", self.name, errors.join("\n  "))
        }
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::standard()
    }
}

fn standard_options() -> Vec<AnswerOption> {
    vec![
        AnswerOption::new("Not considered", 0),
        AnswerOption::new("Planning stage", 1),
        AnswerOption::new("Partially implemented", 2),
        AnswerOption::new("Fully implemented", 3),
        AnswerOption::new("Sector leader", 4),
    ]
}

/// Read and validate a JSON catalog file.
pub fn load_catalog<P: AsRef<Path>>(path: P) -> Result<Catalog> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read catalog: {:?}", path))?;
    let catalog: Catalog = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse catalog: {:?}", path))?;
    catalog.validate()?;

    tracing::debug!(name = %catalog.name, questions = catalog.len(), "Loaded catalog");
    Ok(catalog)
}

/// Built-in catalog unless a file is given.
pub fn resolve_catalog(path: Option<&str>) -> Result<Catalog> {
    match path {
        Some(p) => load_catalog(p),
        None => Ok(Catalog::standard()),
    }
}

/// Reference entry for one UN Sustainable Development Goal. Labelling only.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct Goal {
    pub id: GoalId,
    pub name: &'static str,
    pub color: &'static str,
    /// Relative path of the goal's official icon
    pub icon: &'static str,
    pub description: &'static str,
}

const GOALS: [Goal; GOAL_COUNT as usize] = [
    Goal { id: 1, name: "No poverty", color: "#E5243B", icon: "assets/sdg/sdg-01.png", description: "End poverty in all its forms everywhere." },
    Goal { id: 2, name: "Zero hunger", color: "#DDA63A", icon: "assets/sdg/sdg-02.png", description: "End hunger, achieve food security and promote sustainable agriculture." },
    Goal { id: 3, name: "Good health and well-being", color: "#4C9F38", icon: "assets/sdg/sdg-03.png", description: "Ensure healthy lives and promote well-being for all at all ages." },
    Goal { id: 4, name: "Quality education", color: "#C5192D", icon: "assets/sdg/sdg-04.png", description: "Ensure inclusive and equitable quality education and lifelong learning." },
    Goal { id: 5, name: "Gender equality", color: "#FF3A21", icon: "assets/sdg/sdg-05.png", description: "Achieve gender equality and empower all women and girls." },
    Goal { id: 6, name: "Clean water and sanitation", color: "#26BDE2", icon: "assets/sdg/sdg-06.png", description: "Ensure availability and sustainable management of water and sanitation." },
    Goal { id: 7, name: "Affordable and clean energy", color: "#FCC30B", icon: "assets/sdg/sdg-07.png", description: "Ensure access to affordable, reliable, sustainable and modern energy." },
    Goal { id: 8, name: "Decent work and economic growth", color: "#A21942", icon: "assets/sdg/sdg-08.png", description: "Promote sustained, inclusive economic growth and decent work for all." },
    Goal { id: 9, name: "Industry, innovation and infrastructure", color: "#FD6925", icon: "assets/sdg/sdg-09.png", description: "Build resilient infrastructure and foster innovation." },
    Goal { id: 10, name: "Reduced inequalities", color: "#DD1367", icon: "assets/sdg/sdg-10.png", description: "Reduce inequality within and among countries." },
    Goal { id: 11, name: "Sustainable cities and communities", color: "#FD9D24", icon: "assets/sdg/sdg-11.png", description: "Make cities and human settlements inclusive, safe, resilient and sustainable." },
    Goal { id: 12, name: "Responsible consumption and production", color: "#BF8B2E", icon: "assets/sdg/sdg-12.png", description: "Ensure sustainable consumption and production patterns." },
    Goal { id: 13, name: "Climate action", color: "#3F7E44", icon: "assets/sdg/sdg-13.png", description: "Take urgent action to combat climate change and its impacts." },
    Goal { id: 14, name: "Life below water", color: "#0A97D9", icon: "assets/sdg/sdg-14.png", description: "Conserve and sustainably use the oceans, seas and marine resources." },
    Goal { id: 15, name: "Life on land", color: "#56C02B", icon: "assets/sdg/sdg-15.png", description: "Protect, restore and promote sustainable use of terrestrial ecosystems." },
    Goal { id: 16, name: "Peace, justice and strong institutions", color: "#00689D", icon: "assets/sdg/sdg-16.png", description: "Promote peaceful and inclusive societies and accountable institutions." },
    Goal { id: 17, name: "Partnerships for the goals", color: "#19486A", icon: "assets/sdg/sdg-17.png", description: "Strengthen the means of implementation and global partnerships." },
];

pub fn goal_catalog() -> &'static [Goal] {
    &GOALS
}

pub fn goal(id: GoalId) -> Option<&'static Goal> {
    GOALS.iter().find(|g| g.id == id)
}

/// Goals no question in the catalog points at.
pub fn untagged_goals(catalog: &Catalog) -> Vec<GoalId> {
    goal_ids()
        .filter(|id| !catalog.questions.iter().any(|q| q.goals.contains(id)))
        .collect()
}
