use chat2poe::server::build_router;
use chat2poe::util::{env_bind_addr, init_tracing, AppState};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    // The tokenizer takes a moment to load; warm it before serving traffic.
    chat2poe::token::preload_tokenizer();

    let state = Arc::new(AppState::from_env());
    let app = build_router(state);

    let addr = env_bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("chat2poe listening on {addr}");
    axum::serve(listener, app).await?;
    Ok(())
}
