use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ai_client::Gemini;
use backdrop_api::{router, spawn_session_sweeper, AppState};
use backdrop_common::Config;
use backdrop_studio::{EditPipeline, Encoder};

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("backdrop=info".parse()?)
                .add_directive("ai_client=info".parse()?),
        )
        .init();

    let config = Config::from_env()?;
    config.log_redacted();

    let gemini = Gemini::new(&config.gemini_api_key, &config.gemini_model)
        .with_base_url(&config.gemini_api_base)
        .with_timeout(config.gemini_timeout);

    let state = Arc::new(
        AppState::new(
            EditPipeline::new(Arc::new(gemini)),
            Encoder::new(config.max_upload_bytes),
            config.default_instruction.clone(),
        )
        .with_session_ttl(config.session_ttl)
        .with_max_sessions(config.max_sessions),
    );

    let sweep_every = SWEEP_INTERVAL.min(config.session_ttl).max(Duration::from_secs(1));
    spawn_session_sweeper(state.clone(), sweep_every);
    let app = router(state);

    let addr = format!("{}:{}", config.web_host, config.web_port);
    info!("Backdrop API starting on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
