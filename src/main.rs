use std::sync::Arc;
use tokio::net::TcpListener;

use babbleon::config::Config;
use babbleon::realtime::dispatcher::Dispatcher;
use babbleon::realtime::registry::RoomRegistry;
use babbleon::state::AppState;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "babbleon=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env();
    print_banner(&config);

    let db = babbleon::db::create_pool(&config.database_url)
        .await
        .expect("failed to create database pool");

    let rooms = Arc::new(RoomRegistry::new());
    let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&rooms)));

    let state = AppState {
        db,
        rooms,
        dispatcher,
    };

    let app = babbleon::routes::router(state);

    let listener = TcpListener::bind(("0.0.0.0", config.port))
        .await
        .expect("failed to bind");

    let actual_port = listener
        .local_addr()
        .expect("failed to get local address")
        .port();
    eprintln!("  \x1b[32m→ listening on 0.0.0.0:{actual_port}\x1b[0m");
    eprintln!();

    axum::serve(listener, app).await.expect("server error");
}

fn print_banner(config: &Config) {
    let version = env!("CARGO_PKG_VERSION");

    eprintln!();
    eprintln!("  \x1b[1;36mbabble-on\x1b[0m \x1b[2mv{version}\x1b[0m");
    eprintln!();
    eprintln!("  \x1b[2mport\x1b[0m         {}", config.port);
    eprintln!("  \x1b[2mdatabase\x1b[0m     {}", config.database_url);

    if config.test_mode {
        eprintln!();
        eprintln!("  \x1b[33m! test mode enabled\x1b[0m");
    }

    eprintln!();
}
