//! # StudySync 권한자 서버 진입점
//!
//! 이 파일이 수행하는 작업:
//! 1. 환경변수(.env) 로딩
//! 2. 로깅(tracing) 초기화
//! 3. 오늘 날짜의 스냅샷이 있으면 타이머 상태 복원
//! 4. 스냅샷 쓰기 태스크와 권한자 액터 시작
//! 5. API/WebSocket 라우터 설정
//! 6. HTTP 서버 시작

use std::{path::Path, sync::Arc};

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use chrono::Utc;
use studysync::{
    authority::{AuthorityActor, AuthorityTimings, TimerAuthority},
    clock,
    config::Config,
    routes::{self, AppState},
    services::{ReportRunner, SnapshotStore, StatsPersistence},
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1단계: 환경변수 로딩 ──
    // .env 파일이 없어도 에러 없이 넘어갑니다.
    dotenvy::dotenv().ok();

    // ── 2단계: 로깅 초기화 ──
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "studysync=debug,tower_http=debug,axum=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    tracing::info!("Starting StudySync server on {}:{}", config.host, config.port);

    // ── 3단계: 스냅샷 디렉토리 준비 및 오늘 상태 복원 ──
    let data_path = Path::new(&config.data_path);
    if !data_path.exists() {
        tokio::fs::create_dir_all(data_path).await?;
        tracing::info!("Created data directory: {}", config.data_path);
    }

    let snapshots = SnapshotStore::new(&config.data_path);
    let today = clock::today();
    let mut authority = TimerAuthority::new(today, config.default_total_seconds, Utc::now());
    match snapshots.load(&clock::date_string(today)).await {
        Ok(Some(snapshot)) => authority.seed_from_snapshot(&snapshot),
        Ok(None) => tracing::info!("No snapshot for today, starting fresh"),
        // 읽기 실패는 치명적이지 않습니다. 기본 상태로 시작합니다.
        Err(e) => tracing::warn!("Failed to read today's snapshot: {}", e),
    }

    // ── 4단계: 쓰기 태스크와 권한자 액터 시작 ──
    let (persistence, _writer) = StatsPersistence::spawn(snapshots.clone());
    let (handle, _actor) =
        AuthorityActor::spawn(authority, persistence, AuthorityTimings::default());

    let state = AppState {
        authority: handle,
        snapshots,
        reports: Arc::new(ReportRunner::new(
            config.report_command.clone(),
            config.report_args.clone(),
            config.report_url.clone(),
        )),
    };

    // ── 5단계: 라우터 설정 ──
    let api_routes = Router::new()
        .route("/timers", get(routes::list_timers))
        .route("/timers/{id}", post(routes::update_timer))
        .route("/stats", get(routes::get_stats))
        .route("/generate-report", post(routes::generate_report))
        .route("/health", get(routes::health_check));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let router = Router::new()
        .nest("/api", api_routes)
        .route("/ws", get(routes::ws_handler))
        .with_state(state);

    // 프론트엔드 정적 파일이 있으면 같은 서버에서 서빙합니다.
    let static_path = Path::new(&config.static_path);
    let app = if static_path.exists() {
        tracing::info!("Serving static files from {}", config.static_path);
        router.fallback_service(ServeDir::new(static_path))
    } else {
        tracing::warn!("Static directory {} not found, serving API only", config.static_path);
        router
    }
    .layer(cors)
    .layer(TraceLayer::new_for_http());

    // ── 6단계: 서버 시작 ──
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
