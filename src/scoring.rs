use std::collections::BTreeMap;

use crate::catalog::Catalog;
use crate::data::{goal_ids, AnswerMap, AssessmentResult, Category, GoalId, Identity};

/// Score a questionnaire pass.
///
/// Preconditions (not checked here, see [`Catalog::validate`]): question ids
/// are unique and every question shares the catalog's maximum option value.
/// Answers for ids the catalog doesn't know are ignored; unanswered
/// questions count as 0.
pub fn score_assessment(catalog: &Catalog, answers: &AnswerMap, identity: &Identity) -> AssessmentResult {
    let max_value = u64::from(catalog.max_option_value());

    let mut category_scores: BTreeMap<Category, f64> = BTreeMap::new();
    let mut goal_alignment: BTreeMap<GoalId, u64> = goal_ids().map(|id| (id, 0)).collect();

    for category in Category::ALL {
        let mut count = 0u64;
        let mut actual = 0u64;

        for question in catalog.questions_in(category) {
            let value = u64::from(answers.value_of(&question.id));
            count += 1;
            actual += value;

            for goal in &question.goals {
                // Ids outside the fixed goal set have no slot to accumulate into
                if let Some(total) = goal_alignment.get_mut(goal) {
                    *total += value;
                }
            }
        }

        category_scores.insert(category, percentage(actual, count * max_value));
    }

    let overall_actual: u64 = catalog
        .questions()
        .iter()
        .map(|q| u64::from(answers.value_of(&q.id)))
        .sum();
    let overall_score = percentage(overall_actual, catalog.len() as u64 * max_value);

    AssessmentResult {
        identity: identity.clone(),
        category_scores,
        overall_score,
        goal_alignment,
    }
}

fn percentage(actual: u64, possible: u64) -> f64 {
    if possible == 0 {
        return 0.0;
    }
    actual as f64 / possible as f64 * 100.0
}

/// Whole-number percentage for display. Halves round up, so 52.5 shows as 53.
pub fn round_percent(value: f64) -> f64 {
    (value + 0.5).floor()
}

/// Goals with non-zero alignment, strongest first. Ties break on ascending id.
pub fn ranked_goals(result: &AssessmentResult) -> Vec<(GoalId, u64)> {
    let mut ranked: Vec<(GoalId, u64)> = result
        .goal_alignment
        .iter()
        .filter(|(_, total)| **total > 0)
        .map(|(id, total)| (*id, *total))
        .collect();

    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked
}

/// Highest scoring category, first in declaration order on ties.
pub fn strongest_category(result: &AssessmentResult) -> Option<(Category, f64)> {
    Category::ALL
        .iter()
        .map(|c| (*c, result.category_score(*c)))
        .fold(None, |best, current| match best {
            Some((_, score)) if score >= current.1 => best,
            _ => Some(current),
        })
}

/// Lowest scoring category, first in declaration order on ties.
pub fn weakest_category(result: &AssessmentResult) -> Option<(Category, f64)> {
    Category::ALL
        .iter()
        .map(|c| (*c, result.category_score(*c)))
        .fold(None, |worst, current| match worst {
            Some((_, score)) if score <= current.1 => worst,
            _ => Some(current),
        })
}
