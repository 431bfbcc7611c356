// region:    --- Imports
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::error;

// endregion: --- Imports

// region:    --- Listing Errors
/// 경매 목록 조회 오류
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ListingError {
    /// 변경 피드 커서를 복호화할 수 없거나 숫자가 아님
    #[error("Offset expired/invalid")]
    InvalidOffset,

    /// 다음/이전 페이지 커서 토큰을 만들 수 없음
    #[error("Offset token could not be sealed")]
    TokenSealing,
}
// endregion: --- Listing Errors

// region:    --- Reconcile Errors
/// 경매 결과 검증 오류 (먼저 발견된 하나만 보고)
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReconcileError {
    #[error("Can't {action} in current ({status}) auction status")]
    InvalidState { action: &'static str, status: String },

    #[error("Can {action} only in active lot status")]
    LotNotActive { action: &'static str },

    #[error("Number of auction results did not match the number of auction bids")]
    BidCountMismatch { expected: usize, actual: usize },

    #[error("Auction bids should be identical to the auction bids")]
    BidSetMismatch,

    #[error("Number of lots did not match the number of auction lots")]
    LotCountMismatch { expected: usize, actual: usize },

    #[error("Auction lots should be identical to the auction lots")]
    LotSetMismatch,

    #[error("Number of lots of auction results did not match the number of auction lots")]
    LotValuesCountMismatch { bid_id: String },

    #[error("relatedLot should be one of lots of bid")]
    RelatedLotMismatch { bid_id: String, position: usize },

    /// 경로의 랏 id 가 경매에 없음 (상태 검사 이후에 확인)
    #[error("Not Found")]
    LotNotFound,
}

impl ReconcileError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidState { .. } | Self::LotNotActive { .. } => StatusCode::FORBIDDEN,
            Self::LotNotFound => StatusCode::NOT_FOUND,
            _ => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }

    pub fn location(&self) -> &'static str {
        match self {
            Self::LotNotFound => "url",
            _ => "body",
        }
    }

    /// 오류가 가리키는 필드명
    pub fn field(&self) -> &'static str {
        match self {
            Self::InvalidState { .. } | Self::LotNotActive { .. } => "data",
            Self::LotNotFound => "lot_id",
            Self::LotCountMismatch { .. } | Self::LotSetMismatch => "lots",
            _ => "bids",
        }
    }

    /// 응답 본문의 description (랏별 입찰값 오류는 필드 경로를 중첩해서 표현)
    pub fn description(&self) -> Value {
        match self {
            Self::LotValuesCountMismatch { .. } => json!([{ "lotValues": [self.to_string()] }]),
            Self::RelatedLotMismatch { .. } => {
                json!([{ "lotValues": [{ "relatedLot": [self.to_string()] }] }])
            }
            _ => Value::String(self.to_string()),
        }
    }
}
// endregion: --- Reconcile Errors

// region:    --- Store Errors
/// 저장소 오류
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("malformed document: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("auction {0} not found")]
    NotFound(String),

    #[error("document has no id")]
    MissingId,
}
// endregion: --- Store Errors

// region:    --- Config Errors
/// 설정 오류
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}
// endregion: --- Config Errors

// region:    --- API Errors
/// HTTP 응답으로 변환되는 오류
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Listing(#[from] ListingError),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Not Found")]
    AuctionNotFound,

    #[error("Auction {0} already exists")]
    AuctionExists(String),

    #[error("{0}")]
    MalformedBody(String),
}

impl ApiError {
    /// (상태 코드, location, name, description)
    fn to_parts(&self) -> (StatusCode, &'static str, &'static str, Value) {
        match self {
            Self::Listing(ListingError::InvalidOffset) => (
                StatusCode::NOT_FOUND,
                "querystring",
                "offset",
                Value::String(self.to_string()),
            ),
            Self::Listing(ListingError::TokenSealing) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "querystring",
                "offset",
                Value::String(self.to_string()),
            ),
            Self::Reconcile(e) => (e.status_code(), e.location(), e.field(), e.description()),
            Self::Store(StoreError::NotFound(_)) | Self::AuctionNotFound => (
                StatusCode::NOT_FOUND,
                "url",
                "auction_id",
                Value::String(self.to_string()),
            ),
            Self::Store(e) => {
                error!("{:<12} --> 저장소 오류: {:?}", "ApiError", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "body",
                    "data",
                    Value::String("Internal server error".to_string()),
                )
            }
            Self::AuctionExists(_) => (
                StatusCode::CONFLICT,
                "body",
                "id",
                Value::String(self.to_string()),
            ),
            Self::MalformedBody(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "body",
                "data",
                Value::String(msg.clone()),
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, location, name, description) = self.to_parts();
        (
            status,
            Json(json!({
                "status": "error",
                "errors": [{
                    "location": location,
                    "name": name,
                    "description": description,
                }],
            })),
        )
            .into_response()
    }
}
// endregion: --- API Errors
