mod runs;

use std::sync::Arc;

use clap::{Parser, Subcommand};

use rivalscope_analysis::{AnthropicModel, InsightModel, OpenAiModel, Orchestrator};
use rivalscope_core::{AiProvider, AppConfig};
use rivalscope_source::{HttpSourceAdapter, SourceAdapter, SourceConfig};

#[derive(Debug, Parser)]
#[command(name = "rivalscope-cli")]
#[command(about = "Competitor intelligence command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create an analysis run over a set of competitors.
    CreateRun {
        #[arg(long)]
        name: String,
        /// Competitor ids to include; repeatable.
        #[arg(long = "competitor", required = true)]
        competitor_ids: Vec<i64>,
        /// Analysis window in days.
        #[arg(long)]
        days_back: Option<i64>,
        /// Execute the run immediately after creating it.
        #[arg(long)]
        execute: bool,
    },
    /// Execute a pending analysis run.
    Execute { run_id: i64 },
    /// List recent analysis runs.
    Runs {
        #[arg(long)]
        status: Option<String>,
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
    /// Show the lifecycle status of one run.
    Status { run_id: i64 },
    /// Print one of the run's CSV exports, or the plain-text report.
    Export {
        run_id: i64,
        /// competitors | mentions | presence | insights | opportunities | report
        file: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = rivalscope_core::load_app_config()?;
    let pool_config = rivalscope_db::PoolConfig::from_app_config(&config);
    let pool = rivalscope_db::connect_pool(&config.database_url, pool_config).await?;
    rivalscope_db::run_migrations(&pool).await?;

    let cli = Cli::parse();
    match cli.command {
        Commands::CreateRun {
            name,
            competitor_ids,
            days_back,
            execute,
        } => {
            let run_id =
                runs::run_create(&pool, &name, &competitor_ids, days_back).await?;
            if execute {
                runs::run_execute(&pool, build_orchestrator(&pool, &config)?, run_id).await?;
            }
        }
        Commands::Execute { run_id } => {
            runs::run_execute(&pool, build_orchestrator(&pool, &config)?, run_id).await?;
        }
        Commands::Runs { status, limit } => {
            runs::run_list(&pool, status.as_deref(), limit).await?;
        }
        Commands::Status { run_id } => {
            runs::run_status(&pool, run_id).await?;
        }
        Commands::Export { run_id, file } => {
            runs::run_export(&pool, run_id, &file).await?;
        }
    }

    Ok(())
}

fn build_orchestrator(pool: &sqlx::PgPool, config: &AppConfig) -> anyhow::Result<Orchestrator> {
    let source: Arc<dyn SourceAdapter> = Arc::new(HttpSourceAdapter::new(&SourceConfig {
        base_url: config.news_api_base_url.clone(),
        api_key: config.news_api_key.clone(),
        request_timeout_secs: config.source_request_timeout_secs,
        user_agent: config.source_user_agent.clone(),
    })?);

    let model: Arc<dyn InsightModel> = match config.ai_provider {
        AiProvider::OpenAi => {
            let key = config.openai_api_key.as_deref().ok_or_else(|| {
                anyhow::anyhow!("OPENAI_API_KEY is required when the AI provider is openai")
            })?;
            Arc::new(OpenAiModel::new(key))
        }
        AiProvider::Anthropic => {
            let key = config.anthropic_api_key.as_deref().ok_or_else(|| {
                anyhow::anyhow!(
                    "ANTHROPIC_API_KEY is required when the AI provider is anthropic"
                )
            })?;
            Arc::new(AnthropicModel::new(key))
        }
    };

    Ok(Orchestrator::new(pool.clone(), source, model))
}
