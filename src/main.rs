use serverless_mcp::{
    build_app, config::Config, domain::tools::register_builtin_tools, logging,
    tools::ToolRegistry, AppState,
};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init_logging();

    let config = Config::from_env()?;

    let mut registry = ToolRegistry::new();
    register_builtin_tools(&mut registry)?;
    let tool_count = registry.len();

    let session_store = config.build_session_store();
    let bind_socket = config.bind_socket()?;
    let state = AppState::new(registry, session_store);
    let app = build_app(state);
    let listener = tokio::net::TcpListener::bind(bind_socket).await?;

    info!(
        bind_addr = %config.bind_addr,
        bind_port = config.bind_port,
        session_store = ?config.session_store,
        tools = tool_count,
        "server starting"
    );

    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}
