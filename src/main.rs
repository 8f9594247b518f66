#[cfg(test)]
mod client;
mod event;
mod llm;
mod relay;
mod routes;
mod services;
mod state;

use std::sync::Arc;

use llm::LlmComplete;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "5000".into())
        .parse()
        .expect("invalid PORT");

    // Initialize LLM client (non-fatal: AI features fall back if config missing).
    let llm: Option<Arc<dyn LlmComplete>> = match llm::LlmClient::from_env() {
        Ok(client) => {
            tracing::info!(model = client.model(), "LLM client initialized");
            Some(Arc::new(client))
        }
        Err(e) => {
            tracing::warn!(error = %e, "LLM client not configured — AI endpoints serve fallbacks");
            None
        }
    };

    let relay = relay::spawn();
    let state = state::AppState::new(relay, llm);

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "tutorboard listening");
    axum::serve(listener, app).await.expect("server failed");
}
