mod api;
mod middleware;
mod scheduler;

use std::sync::Arc;

use rivalscope_analysis::{AnthropicModel, InsightModel, OpenAiModel, Orchestrator};
use rivalscope_core::{AiProvider, AppConfig};
use rivalscope_source::{HttpSourceAdapter, SourceAdapter, SourceConfig};
use tracing_subscriber::EnvFilter;

use crate::api::{build_app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Arc::new(rivalscope_core::load_app_config()?);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = rivalscope_db::PoolConfig::from_app_config(&config);
    let pool = rivalscope_db::connect_pool(&config.database_url, pool_config).await?;
    rivalscope_db::run_migrations(&pool).await?;

    let source: Arc<dyn SourceAdapter> = Arc::new(HttpSourceAdapter::new(&SourceConfig {
        base_url: config.news_api_base_url.clone(),
        api_key: config.news_api_key.clone(),
        request_timeout_secs: config.source_request_timeout_secs,
        user_agent: config.source_user_agent.clone(),
    })?);
    let model = build_insight_model(&config)?;
    let orchestrator = Orchestrator::new(pool.clone(), source, model);

    let _scheduler = scheduler::build_scheduler(
        pool.clone(),
        orchestrator.clone(),
        config.pending_sweep_grace_secs,
    )
    .await?;

    let app = build_app(AppState { pool, orchestrator });

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

fn build_insight_model(config: &AppConfig) -> anyhow::Result<Arc<dyn InsightModel>> {
    match config.ai_provider {
        AiProvider::OpenAi => {
            let key = config
                .openai_api_key
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("OPENAI_API_KEY is required when the AI provider is openai"))?;
            Ok(Arc::new(OpenAiModel::new(key)))
        }
        AiProvider::Anthropic => {
            let key = config
                .anthropic_api_key
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("ANTHROPIC_API_KEY is required when the AI provider is anthropic"))?;
            Ok(Arc::new(AnthropicModel::new(key)))
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
