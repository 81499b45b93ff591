use user_registry::{app, state::AppState};

fn init_tracing(json_logs: bool) {
    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "user_registry=debug,axum=info,tower_http=info".to_string());

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let app_state = AppState::init()?;
    init_tracing(app_state.config.json_logs);
    app_state.users.reset()?;

    let config = app_state.config.clone();
    let router = app::build_app(app_state);
    app::serve(router, &config).await
}
