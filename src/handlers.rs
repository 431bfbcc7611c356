// region:    --- Imports
use crate::auction::model::Auction;
use crate::config::Settings;
use crate::error::{ApiError, StoreError};
use crate::listing::token::SealedTokenCipher;
use crate::listing::{ListingCursor, ListingPage, ListingParams, ViewRegistry};
use crate::reconcile::{ReportAction, ResultReconciler};
use crate::store::AuctionStore;
use crate::auction::model::format_timestamp;
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use uuid::Uuid;

// endregion: --- Imports

const AUCTIONS_PATH: &str = "/auctions";
const MAX_BODY_BYTES: usize = 1024 * 1024 * 20;
/// 생성 요청에 status 가 없을 때의 초기 상태
const INITIAL_STATUS: &str = "active.tendering";

// region:    --- State / Router
/// 핸들러 공유 상태
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn AuctionStore>,
    pub cursor: Arc<ListingCursor>,
}

impl AppState {
    pub fn new(settings: &Settings, store: Arc<dyn AuctionStore>) -> Self {
        let cursor = ListingCursor::new(
            ViewRegistry::standard(),
            Arc::new(SealedTokenCipher),
            settings.instance_key.clone(),
            settings.feed_namespace.clone(),
        )
        .with_links(AUCTIONS_PATH, settings.public_url.clone());
        Self {
            store,
            cursor: Arc::new(cursor),
        }
    }
}

/// 라우터 설정
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(
            AUCTIONS_PATH,
            get(handle_list_auctions).post(handle_create_auction),
        )
        .route("/auctions/:auction_id", get(handle_get_auction))
        .route(
            "/auctions/:auction_id/auction",
            post(handle_report_results).patch(handle_update_results),
        )
        .route(
            "/auctions/:auction_id/auction/:auction_lot_id",
            post(handle_report_results).patch(handle_update_results),
        )
        .layer(cors)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}
// endregion: --- State / Router

// region:    --- Query Handlers

/// 경매 목록 조회
pub async fn handle_list_auctions(
    State(state): State<AppState>,
    Query(params): Query<ListingParams>,
) -> Result<Json<ListingPage>, ApiError> {
    let plan = state.cursor.plan(&params)?;
    if plan.query.uses_custom_fields() {
        info!(
            "{:<12} --> 사용자 지정 필드로 경매 목록 조회: {}",
            "HandlerQuery",
            sorted_fields(&plan.query.fields)
        );
    }
    let rows = state.store.scan(&plan.scan).await?;
    let page = state.cursor.paginate(&plan, &rows)?;
    info!(
        "{:<12} --> 경매 목록 조회: view={}, count={}",
        "HandlerQuery",
        plan.scan.view.name,
        page.data.len()
    );
    Ok(Json(page))
}

/// 경매 조회
pub async fn handle_get_auction(
    State(state): State<AppState>,
    Path(auction_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    info!("{:<12} --> 경매 조회 id: {}", "HandlerQuery", auction_id);
    let doc = state
        .store
        .get_auction(&auction_id)
        .await?
        .ok_or(ApiError::AuctionNotFound)?;
    Ok(Json(json!({ "data": doc })))
}

fn sorted_fields(fields: &[String]) -> String {
    let mut fields = fields.to_vec();
    fields.sort();
    fields.join(",")
}

// endregion: --- Query Handlers

// region:    --- Command Handlers
/// 경매 생성
/// id 가 없으면 새로 발급하고, 수정 시각은 항상 서버 시각으로 기록
pub async fn handle_create_auction(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let mut data = parse_payload(&body)?
        .ok_or_else(|| ApiError::MalformedBody("Data not available".to_string()))?;

    let auction_id = match data.get("id").and_then(Value::as_str) {
        Some(auction_id) => auction_id.to_string(),
        None => Uuid::new_v4().simple().to_string(),
    };
    if state.store.get_auction(&auction_id).await?.is_some() {
        return Err(ApiError::AuctionExists(auction_id));
    }
    data.insert("id".to_string(), Value::String(auction_id.clone()));
    data.entry("status")
        .or_insert_with(|| Value::String(INITIAL_STATUS.to_string()));
    data.insert(
        "dateModified".to_string(),
        Value::String(format_timestamp(Utc::now())),
    );

    let doc = Value::Object(data);
    // 결과 보고에서 읽을 수 있는 문서인지 저장 전에 확인
    serde_json::from_value::<Auction>(doc.clone())
        .map_err(|e| ApiError::MalformedBody(e.to_string()))?;

    let created = state.store.put_auction(doc).await?;
    info!("{:<12} --> 경매 생성 완료: id={}", "Command", auction_id);
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, format!("{}/{}", AUCTIONS_PATH, auction_id))],
        Json(json!({ "data": created })),
    ))
}

#[derive(Debug, Deserialize)]
pub struct AuctionPath {
    pub auction_id: String,
    #[serde(default)]
    pub auction_lot_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DataEnvelope {
    data: Option<Map<String, Value>>,
}

/// 경매 결과 보고 (확정)
pub async fn handle_report_results(
    State(state): State<AppState>,
    Path(path): Path<AuctionPath>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    reconcile_results(&state, &path, ReportAction::Finalize, &body).await
}

/// 경매 결과 부분 수정
pub async fn handle_update_results(
    State(state): State<AppState>,
    Path(path): Path<AuctionPath>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    reconcile_results(&state, &path, ReportAction::Update, &body).await
}

/// 결과 검증 → 패치 저장
async fn reconcile_results(
    state: &AppState,
    path: &AuctionPath,
    action: ReportAction,
    body: &[u8],
) -> Result<Json<Value>, ApiError> {
    info!(
        "{:<12} --> 경매 결과 처리 시작: auction={}, lot={:?}, action={:?}",
        "Command", path.auction_id, path.auction_lot_id, action
    );
    let payload = parse_payload(body)?;

    let doc = state
        .store
        .get_auction(&path.auction_id)
        .await?
        .ok_or(ApiError::AuctionNotFound)?;
    let auction: Auction = serde_json::from_value(doc).map_err(StoreError::from)?;

    let patch = ResultReconciler::new(&auction, path.auction_lot_id.as_deref())
        .reconcile(action, payload, Utc::now())
        .map_err(|e| {
            warn!(
                "{:<12} --> 경매 결과 검증 실패: auction={}, error={}",
                "Command", auction.id, e
            );
            e
        })?;

    let updated = state.store.patch_auction(&auction.id, &patch).await?;
    info!(
        "{:<12} --> 경매 결과 저장 완료: auction={}",
        "Command", auction.id
    );
    Ok(Json(json!({ "data": updated })))
}

/// 요청 본문 해석 (빈 본문은 payload 없음)
fn parse_payload(body: &[u8]) -> Result<Option<Map<String, Value>>, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    let envelope: DataEnvelope = serde_json::from_slice(body)
        .map_err(|e| ApiError::MalformedBody(format!("Expecting value: {}", e)))?;
    envelope
        .data
        .map(Some)
        .ok_or_else(|| ApiError::MalformedBody("Data not available".to_string()))
}

// endregion: --- Command Handlers
