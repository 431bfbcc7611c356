// region:    --- Imports
use auction_registry::config::Settings;
use auction_registry::database::DatabaseManager;
use auction_registry::handlers::{self, AppState};
use auction_registry::store::{AuctionStore, MemoryAuctionStore, PgAuctionStore};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
// endregion: --- Imports

// region:    --- Main
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // logging 초기화
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .without_time()
        .with_target(false)
        .init();

    let settings = Settings::from_env()?;

    // 저장소 선택 (DATABASE_URL 이 없으면 메모리 저장소)
    let store: Arc<dyn AuctionStore> = match settings.database_url.as_deref() {
        Some(database_url) => {
            let db_manager = Arc::new(DatabaseManager::connect(database_url, &settings).await?);
            if let Err(e) = db_manager.initialize_database().await {
                error!("{:<12} --> 데이터베이스 초기화 실패: {:?}", "Main", e);
                return Err(e.into());
            }
            info!("{:<12} --> 데이터베이스 초기화 성공", "Main");
            Arc::new(PgAuctionStore::new(db_manager))
        }
        None => {
            warn!("{:<12} --> DATABASE_URL 없음: 메모리 저장소로 실행", "Main");
            Arc::new(MemoryAuctionStore::new())
        }
    };

    let routes_all = handlers::router(AppState::new(&settings, store));

    // 리스너 생성
    let listener = TcpListener::bind(&settings.bind_addr).await?;
    info!(
        "{:<12} --> Web Server: Listening on {}",
        "Main",
        listener.local_addr()?
    );

    // 서버 실행
    if let Err(err) = axum::serve(listener, routes_all.into_make_service()).await {
        error!("{:<12} --> Server error: {}", "Main", err);
    }
    Ok(())
}
// endregion: --- Main
