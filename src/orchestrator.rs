use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::fs;
use std::io::{self, BufRead, Write};

use crate::catalog::{goal, goal_catalog, load_catalog, resolve_catalog, Catalog};
use crate::config::NarrativeConfig;
use crate::data::{AnswerMap, AssessmentResult, Category, CompanySize, GoalId, Identity};
use crate::narrative::{build_provider, generate_report, NarrativeProvider};
use crate::scoring::{
    ranked_goals, round_percent, score_assessment, strongest_category, weakest_category,
};
use crate::session::{Session, Step};

/// List the questions of a catalog
pub fn list_questions(catalog_path: Option<&str>) -> Result<()> {
    let catalog = resolve_catalog(catalog_path)?;

    println!("Catalog '{}': {} questions", catalog.name, catalog.len());
    println!("{:<6} {:<28} {:<12} QUESTION", "ID", "CATEGORY", "GOALS");
    println!("{}", "-".repeat(90));

    for q in catalog.questions() {
        let goals = q
            .goals
            .iter()
            .map(|g| g.to_string())
            .collect::<Vec<_>>()
            .join(",");
        println!("{:<6} {:<28} {:<12} {}", q.id, q.category.label(), goals, q.text);
    }

    println!();
    println!("Scale (max {}):", catalog.max_option_value());
    if let Some(first) = catalog.questions().first() {
        for option in &first.options {
            println!("  {} = {}", option.value, option.label);
        }
    }

    Ok(())
}

/// List the 17 goals, or show one in detail
pub fn show_goals(catalog_path: Option<&str>, id: Option<u8>) -> Result<()> {
    let catalog = resolve_catalog(catalog_path)?;

    match id {
        Some(id) => {
            let g = goal(id).ok_or_else(|| anyhow::anyhow!("Unknown goal: {} (expected 1-17)", id))?;
            let tagged = tagged_questions(&catalog, id);

            println!("# SDG {}: {}\n", g.id, g.name);
            println!("{}\n", g.description);
            println!("**Color:** {}", g.color);
            println!("**Icon:** {}", g.icon);
            if tagged.is_empty() {
                println!("**Questions:** none in the '{}' catalog", catalog.name);
            } else {
                println!("**Questions:** {}", tagged.join(", "));
            }
        }
        None => {
            println!("{:<4} {:<42} {:<9} {:<10}", "ID", "GOAL", "COLOR", "QUESTIONS");
            println!("{}", "-".repeat(68));
            for g in goal_catalog() {
                println!(
                    "{:<4} {:<42} {:<9} {:<10}",
                    g.id,
                    g.name,
                    g.color,
                    tagged_questions(&catalog, g.id).len()
                );
            }
        }
    }

    Ok(())
}

/// Ids of the catalog questions that point at a goal, in catalog order.
fn tagged_questions(catalog: &Catalog, goal_id: GoalId) -> Vec<&str> {
    catalog
        .questions()
        .iter()
        .filter(|q| q.goals.contains(&goal_id))
        .map(|q| q.id.as_str())
        .collect()
}

/// Read an answer map from a JSON file
pub fn load_answers(path: &str, catalog: &Catalog) -> Result<AnswerMap> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read answers: {}", path))?;
    let answers: AnswerMap =
        serde_json::from_str(&content).with_context(|| format!("Failed to parse answers: {}", path))?;

    if answers.is_empty() {
        tracing::warn!(path, "Answer file is empty; every question scores 0");
    }

    for (id, value) in answers.iter() {
        match catalog.question(id) {
            None => tracing::warn!(question = id, "Answer for unknown question ignored"),
            Some(q) if !q.has_option_value(value) => {
                tracing::warn!(question = id, value, "Answer is not one of the question's options")
            }
            Some(_) => {}
        }
    }

    Ok(answers)
}

pub fn parse_size(value: &str) -> Result<CompanySize> {
    CompanySize::parse(value).ok_or_else(|| {
        anyhow::anyhow!(
            "Unknown company size '{}' (expected self_employed, micro, small or medium)",
            value
        )
    })
}

/// Score an answer file and print the result
pub fn score(catalog_path: Option<&str>, answers_path: &str, identity: &Identity, format: &str) -> Result<()> {
    let catalog = resolve_catalog(catalog_path)?;
    let answers = load_answers(answers_path, &catalog)?;
    let result = score_assessment(&catalog, &answers, identity);

    tracing::info!(
        answered = answers.len(),
        questions = catalog.len(),
        overall = result.overall_score,
        "Scored assessment"
    );

    match format {
        "md" => print!("{}", render_markdown(&result)),
        _ => println!("{}", serde_json::to_string_pretty(&result)?),
    }

    Ok(())
}

/// Score an answer file and print the markdown result with a narrative report
pub fn report(
    catalog_path: Option<&str>,
    answers_path: &str,
    identity: &Identity,
    config: &NarrativeConfig,
) -> Result<()> {
    let catalog = resolve_catalog(catalog_path)?;
    let answers = load_answers(answers_path, &catalog)?;
    let result = score_assessment(&catalog, &answers, identity);

    // Scores are shown before the network call so they never wait on it
    print!("{}", render_markdown(&result));
    io::stdout().flush()?;

    let provider = build_provider(config);
    let narrative = generate_report(provider.as_ref(), &result, config);
    println!("\n---\n\n{}", narrative.trim_end());

    Ok(())
}

/// Render a result as markdown
pub fn render_markdown(result: &AssessmentResult) -> String {
    let mut out = String::new();
    let identity = &result.identity;

    out.push_str(&format!("# SDG Positioning: {}\n\n", identity.company_name));
    out.push_str(&format!(
        "**Sector:** {} | **Size:** {}\n\n",
        identity.sector,
        identity.size.label()
    ));
    out.push_str(&format!(
        "**Overall maturity:** {:.0}%\n\n",
        round_percent(result.overall_score)
    ));

    out.push_str("## Categories\n\n");
    out.push_str("| Category | Score |\n|---|---|\n");
    for category in Category::ALL {
        out.push_str(&format!(
            "| {} | {:.0}% |\n",
            category.label(),
            round_percent(result.category_score(category))
        ));
    }

    if let (Some((best, best_score)), Some((worst, worst_score))) =
        (strongest_category(result), weakest_category(result))
    {
        out.push_str(&format!(
            "\nStrongest: {} ({:.0}%). Weakest: {} ({:.0}%).\n",
            best.label(),
            round_percent(best_score),
            worst.label(),
            round_percent(worst_score)
        ));
    }

    out.push_str("\n## Goal alignment\n\n");
    let ranked = ranked_goals(result);
    if ranked.is_empty() {
        out.push_str("No goal alignment yet.\n");
    } else {
        for (rank, (id, total)) in ranked.iter().enumerate() {
            let name = goal(*id).map(|g| g.name).unwrap_or("Unknown");
            out.push_str(&format!("{}. SDG {} {} ({})\n", rank + 1, id, name, total));
        }
    }

    out
}

/// Interactive questionnaire on stdin/stdout
pub fn assess(catalog_path: Option<&str>, config: &NarrativeConfig) -> Result<()> {
    let catalog = resolve_catalog(catalog_path)?;
    let provider = build_provider(config);

    let stdin = io::stdin();
    let stdout = io::stdout();
    let session = run_wizard(
        &mut stdin.lock(),
        &mut stdout.lock(),
        &catalog,
        provider.as_ref(),
        config,
    )?;

    tracing::info!(session = %session.id, step = ?session.step, "Wizard finished");
    Ok(())
}

/// Drive [`Session`]s from line input. After Results the user may start a
/// new assessment, which resets the session. Returns the last session as it
/// ended, in Results unless the user quit early.
pub fn run_wizard<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    catalog: &Catalog,
    provider: &dyn NarrativeProvider,
    config: &NarrativeConfig,
) -> Result<Session> {
    let mut session = Session::new();

    loop {
        session = run_assessment(input, output, catalog, provider, config, session)?;
        if session.step != Step::Results {
            return Ok(session);
        }

        let Some(choice) = prompt(input, output, "\n[N] New assessment | [Q] Quit: ")? else {
            return Ok(session);
        };
        if !choice.eq_ignore_ascii_case("n") {
            return Ok(session);
        }

        session = session.reset();
        writeln!(output)?;
    }
}

/// One pass from Landing to Results with the narrative attached.
fn run_assessment<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    catalog: &Catalog,
    provider: &dyn NarrativeProvider,
    config: &NarrativeConfig,
    session: Session,
) -> Result<Session> {
    writeln!(output, "SDG self-assessment ({} questions)", catalog.len())?;
    let mut session = session.begin()?;

    // Registration, repeated until valid
    loop {
        let Some(company) = prompt(input, output, "Company name: ")? else {
            return Ok(session);
        };
        let Some(sector) = prompt(input, output, "Sector: ")? else {
            return Ok(session);
        };
        let Some(size_raw) = prompt(input, output, "Size [self_employed|micro|small|medium]: ")? else {
            return Ok(session);
        };
        let Some(email) = prompt(input, output, "Contact email (optional): ")? else {
            return Ok(session);
        };

        let size = match parse_size(&size_raw) {
            Ok(size) => size,
            Err(e) => {
                writeln!(output, "{}", e)?;
                continue;
            }
        };
        let email = if email.is_empty() { None } else { Some(email) };

        match session.clone().register(Identity::new(company, sector, size), email) {
            Ok(next) => {
                session = next;
                break;
            }
            Err(e) => writeln!(output, "{}", e)?,
        }
    }

    writeln!(output, "Answer with the option number. [B] Back | [Q] Quit\n")?;

    while let Some(question) = session.current_question(catalog) {
        let (current, total) = session.progress(catalog);

        writeln!(output, "[{}/{}] {} - {}", current, total, question.category.label(), question.text)?;
        for option in &question.options {
            let marker = if session.answers.is_answered(&question.id)
                && session.answers.value_of(&question.id) == option.value
            {
                "*"
            } else {
                " "
            };
            writeln!(output, " {}{}) {}", marker, option.value, option.label)?;
        }

        let Some(line) = prompt(input, output, "> ")? else {
            return Ok(session);
        };

        match line.to_lowercase().as_str() {
            "q" => return Ok(session),
            "b" => session = session.previous()?,
            raw => match raw.parse::<u32>() {
                Ok(value) => match session.clone().answer(catalog, value) {
                    Ok(next) => {
                        if let Some(label) = question.option_label(value) {
                            writeln!(output, "{}: {}", question.id, label)?;
                        }
                        session = next;
                    }
                    Err(e) => writeln!(output, "{}", e)?,
                },
                Err(_) => writeln!(output, "Enter an option number, B or Q")?,
            },
        }
        writeln!(output)?;
    }

    if let Some(result) = session.result.as_ref() {
        write!(output, "{}", render_markdown(result))?;
        output.flush()?;
    }

    let session = session.generate_narrative(provider, config);
    if let Some(text) = session.narrative_text() {
        writeln!(output, "\n---\n\n{}", text.trim_end())?;
    }

    Ok(session)
}

/// Print a prompt and read one trimmed line. None on end of input.
fn prompt<R: BufRead, W: Write>(input: &mut R, output: &mut W, label: &str) -> Result<Option<String>> {
    write!(output, "{}", label)?;
    output.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

/// Random answer map drawn from each question's options
pub fn sample_answers(catalog: &Catalog, seed: u64) -> AnswerMap {
    let mut rng = StdRng::seed_from_u64(seed);
    catalog
        .questions()
        .iter()
        .filter_map(|q| q.options.choose(&mut rng).map(|o| (q.id.clone(), o.value)))
        .collect()
}

/// Print a random answer map as JSON
pub fn sample(catalog_path: Option<&str>, seed: Option<u64>) -> Result<()> {
    let catalog = resolve_catalog(catalog_path)?;
    let seed = seed.unwrap_or_else(rand::random);
    tracing::debug!(seed, "Sampling answers");

    let answers = sample_answers(&catalog, seed);
    println!("{}", serde_json::to_string_pretty(&answers)?);
    Ok(())
}

/// Load and validate a catalog file
pub fn validate_catalog(path: &str) -> Result<()> {
    let catalog = load_catalog(path)?;
    println!(
        "Catalog '{}': OK ({} questions, scale 0-{})",
        catalog.name,
        catalog.len(),
        catalog.max_option_value()
    );

    for category in Category::ALL {
        let count = catalog.questions_in(category).count();
        if count == 0 {
            println!("Note: no questions for {}; it will always score 0", category.label());
        }
    }

    let untagged = crate::catalog::untagged_goals(&catalog);
    if !untagged.is_empty() {
        let ids = untagged
            .iter()
            .map(|g| g.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        println!("Note: goals never tagged: {}", ids);
    }

    Ok(())
}
