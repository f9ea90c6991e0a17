use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

use tilesync_server::config::{generate_config_template, Config};
use tilesync_server::directory::SqliteDirectory;
use tilesync_server::{db, routes, state};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load config with layered precedence: defaults < TOML < env < CLI
    let config = Config::load()?;

    // Handle --generate-config: print template and exit
    if config.generate_config {
        print!("{}", generate_config_template());
        return Ok(());
    }

    init_tracing(config.json_logs);

    tracing::info!("tilesync server v{} starting", env!("CARGO_PKG_VERSION"));

    let db = db::init_db(&config.data_dir)?;
    let directory = Arc::new(SqliteDirectory::new(db, config.spawn.clone().into()));

    let idle_timeout = config.idle_timeout();
    match idle_timeout {
        Some(limit) => tracing::info!("Idle WebSocket sessions close after {:?}", limit),
        None => tracing::info!("Idle WebSocket sessions are kept open"),
    }

    // Starts the broadcast dispatcher and presence tracker tasks
    let app_state = state::AppState::start(directory.clone(), directory, idle_timeout);

    let app = routes::build_router(app_state);

    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

fn init_tracing(json_logs: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("tilesync_server=info"));

    if json_logs {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().pretty().with_env_filter(filter).init();
    }
}
