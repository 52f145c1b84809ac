use axum::{
    routing::{get, post},
    Router,
};
use quizround::{
    config::GameConfig,
    leaderboard::get_leaderboard,
    notifications::TracingNotifier,
    prize_round::{get_prize_round_status, Scheduler},
    questions::{request_question, start_cleanup_task, submit_answer},
    shared::{health, AppState},
    storage::{GameStore, InMemoryGameStore, PostgresGameStore},
    user::register_user,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

async fn connect_store(config: &GameConfig) -> Arc<dyn GameStore> {
    let Some(database_url) = config.database_url.as_deref() else {
        info!("DATABASE_URL not set, using in-memory store");
        return Arc::new(InMemoryGameStore::new());
    };

    match sqlx::PgPool::connect(database_url).await {
        Ok(pool) => {
            info!("Connected to PostgreSQL");
            Arc::new(PostgresGameStore::new(pool))
        }
        Err(e) => {
            warn!(error = %e, "Failed to connect to database, falling back to in-memory store");
            Arc::new(InMemoryGameStore::new())
        }
    }
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quizround=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting quiz round server");

    let config = Arc::new(GameConfig::from_env());
    let store = connect_store(&config).await;
    let app_state = AppState::new(config.clone(), store.clone(), Arc::new(TracingNotifier::new()));

    tokio::spawn(start_cleanup_task(
        app_state.questions.clone(),
        config.sessions.clone(),
    ));

    let scheduler = Scheduler::new(
        app_state.prize_round.clone(),
        store,
        app_state.broadcaster.clone(),
        config.clone(),
    );
    tokio::spawn(scheduler.run());

    let app = Router::new()
        .route("/health", get(health))
        .route("/users", post(register_user))
        .route("/questions", post(request_question))
        .route("/answers", post(submit_answer))
        .route("/leaderboard", get(get_leaderboard))
        .route("/prize-round", get(get_prize_round_status))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    let listener = match tokio::net::TcpListener::bind(&config.bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(addr = %config.bind_addr, error = %e, "Failed to bind listener");
            return;
        }
    };
    info!("Server running on http://{}", config.bind_addr);

    if let Err(e) = axum::serve(listener, app).await {
        error!(error = %e, "Server stopped with error");
    }
}
