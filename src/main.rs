use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod catalog;
mod config;
mod data;
mod narrative;
mod orchestrator;
mod scoring;
mod session;

use config::{NarrativeConfig, ProviderKind};
use data::Identity;

#[derive(Parser)]
#[command(name = "sdgscore")]
#[command(about = "Sustainability self-assessment: maturity scores and SDG alignment", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct CompanyArgs {
    /// Company name
    #[arg(long)]
    company: String,

    /// Business sector
    #[arg(long)]
    sector: String,

    /// Company size (self_employed, micro, small, medium)
    #[arg(long, default_value = "micro")]
    size: String,
}

impl CompanyArgs {
    fn identity(&self) -> Result<Identity> {
        let size = orchestrator::parse_size(&self.size)?;
        Ok(Identity::new(self.company.clone(), self.sector.clone(), size))
    }
}

#[derive(Args)]
struct NarrativeArgs {
    /// Report generator (mock or gemini)
    #[arg(long)]
    provider: Option<String>,

    /// Model name for the report generator
    #[arg(long)]
    model: Option<String>,

    /// Report language code
    #[arg(long)]
    language: Option<String>,
}

impl NarrativeArgs {
    fn config(&self) -> Result<NarrativeConfig> {
        let mut config = NarrativeConfig::from_env();
        if let Some(raw) = &self.provider {
            config.provider = ProviderKind::parse(raw)
                .ok_or_else(|| anyhow::anyhow!("Unknown provider '{}' (expected mock or gemini)", raw))?;
        }
        if let Some(model) = &self.model {
            config.model = model.clone();
        }
        if let Some(language) = &self.language {
            config.language = language.clone();
        }
        Ok(config)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List catalog questions
    Questions {
        /// Catalog JSON file (default: built-in catalog)
        #[arg(long)]
        catalog: Option<String>,
    },

    /// List the 17 Sustainable Development Goals
    Goals {
        /// Show a single goal
        #[arg(long)]
        id: Option<u8>,

        /// Catalog JSON file used to list tagged questions (default: built-in catalog)
        #[arg(long)]
        catalog: Option<String>,
    },

    /// Score an answer file
    Score {
        /// Answers JSON file: {"question_id": value, ...}
        #[arg(long)]
        answers: String,

        #[command(flatten)]
        company: CompanyArgs,

        /// Catalog JSON file (default: built-in catalog)
        #[arg(long)]
        catalog: Option<String>,

        /// Output format (json or md)
        #[arg(long, default_value = "json")]
        format: String,
    },

    /// Score an answer file and generate the narrative report
    Report {
        /// Answers JSON file: {"question_id": value, ...}
        #[arg(long)]
        answers: String,

        #[command(flatten)]
        company: CompanyArgs,

        /// Catalog JSON file (default: built-in catalog)
        #[arg(long)]
        catalog: Option<String>,

        #[command(flatten)]
        narrative: NarrativeArgs,
    },

    /// Answer the questionnaire interactively
    Assess {
        /// Catalog JSON file (default: built-in catalog)
        #[arg(long)]
        catalog: Option<String>,

        #[command(flatten)]
        narrative: NarrativeArgs,
    },

    /// Print a random answer file
    Sample {
        /// RNG seed for reproducible output
        #[arg(long)]
        seed: Option<u64>,

        /// Catalog JSON file (default: built-in catalog)
        #[arg(long)]
        catalog: Option<String>,
    },

    /// Validate a catalog file
    Validate {
        /// Catalog JSON file
        #[arg(long)]
        catalog: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Questions { catalog } => {
            tracing::info!(catalog = ?catalog, "Listing questions");
            orchestrator::list_questions(catalog.as_deref())?;
        }
        Commands::Goals { id, catalog } => {
            orchestrator::show_goals(catalog.as_deref(), id)?;
        }
        Commands::Score {
            answers,
            company,
            catalog,
            format,
        } => {
            tracing::info!(answers = %answers, format = %format, "Scoring answers");
            orchestrator::score(catalog.as_deref(), &answers, &company.identity()?, &format)?;
        }
        Commands::Report {
            answers,
            company,
            catalog,
            narrative,
        } => {
            let config = narrative.config()?;
            tracing::info!(answers = %answers, provider = ?config.provider, "Building report");
            orchestrator::report(catalog.as_deref(), &answers, &company.identity()?, &config)?;
        }
        Commands::Assess { catalog, narrative } => {
            let config = narrative.config()?;
            tracing::info!(catalog = ?catalog, provider = ?config.provider, "Starting assessment");
            orchestrator::assess(catalog.as_deref(), &config)?;
        }
        Commands::Sample { seed, catalog } => {
            orchestrator::sample(catalog.as_deref(), seed)?;
        }
        Commands::Validate { catalog } => {
            tracing::info!(catalog = %catalog, "Validating catalog");
            orchestrator::validate_catalog(&catalog)?;
        }
    }

    Ok(())
}
