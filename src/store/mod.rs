/// 경매 문서 저장소
/// 1. 정렬된 인덱스(뷰) 범위 조회
/// 2. 문서 단건 조회 / 저장 / 병합 패치
// region:    --- Imports
use crate::error::StoreError;
use crate::listing::{Feed, Mode};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::fmt;

// endregion: --- Imports

// region:    --- Modules
pub mod memory;
pub mod postgres;

pub(crate) use crate::auction::model::format_timestamp;
pub use memory::MemoryAuctionStore;
pub use postgres::PgAuctionStore;
// endregion: --- Modules

/// 인덱스 값에 포함되는 필드 (이 필드만 요청하면 문서를 읽지 않음)
pub const INDEXED_FIELDS: &[&str] = &["auctionID", "dateModified"];

// region:    --- View Model
/// 뷰 정의 (피드 × 모드)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewSpec {
    pub name: &'static str,
    pub feed: Feed,
    pub mode: Mode,
}

impl ViewSpec {
    /// 모드 필터 (`is_test` 는 문서의 `mode == "test"` 여부)
    pub fn includes(&self, is_test: bool) -> bool {
        match self.mode {
            Mode::Real => !is_test,
            Mode::Test => is_test,
            Mode::All => true,
        }
    }
}

/// 범위 조회 시작 경계
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanBoundary {
    /// 수정 시각 뷰 키 (시각 + 문서 id)
    Key(String),
    /// 변경 순번
    Seq(i64),
    /// 가장 최근 변경 (상한 없음)
    Latest,
}

impl fmt::Display for ScanBoundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => write!(f, "{}", key),
            Self::Seq(seq) => write!(f, "{}", seq),
            Self::Latest => write!(f, "now"),
        }
    }
}

/// 뷰 행의 정렬 키
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum ViewKey {
    Text(String),
    Seq(i64),
}

/// 범위 조회 요청
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRequest {
    pub view: ViewSpec,
    pub start: ScanBoundary,
    pub limit: usize,
    pub descending: bool,
    pub include_docs: bool,
}

impl ScanRequest {
    /// 시작 경계 이후(방향 기준)에 있는 키인지 확인
    pub fn admits(&self, key: &ViewKey) -> bool {
        let ordering = match (&self.start, key) {
            (ScanBoundary::Latest, _) => return self.descending,
            (ScanBoundary::Key(start), ViewKey::Text(key)) => key.as_str().cmp(start.as_str()),
            (ScanBoundary::Seq(start), ViewKey::Seq(key)) => key.cmp(start),
            _ => return false,
        };
        match ordering {
            Ordering::Equal => true,
            Ordering::Greater => !self.descending,
            Ordering::Less => self.descending,
        }
    }
}

/// 범위 조회 결과 행
#[derive(Debug, Clone, PartialEq)]
pub struct ViewRow {
    pub key: ViewKey,
    pub id: String,
    pub value: Map<String, Value>,
    pub doc: Option<Value>,
}
// endregion: --- View Model

// region:    --- Store Trait
/// 경매 저장소 트레이트
#[async_trait]
pub trait AuctionStore: Send + Sync {
    /// 뷰 범위 조회 (키 순, 동일 키는 문서 id 순)
    async fn scan(&self, request: &ScanRequest) -> Result<Vec<ViewRow>, StoreError>;

    /// 경매 문서 조회
    async fn get_auction(&self, auction_id: &str) -> Result<Option<Value>, StoreError>;

    /// 경매 문서 저장 (새 변경 순번 부여)
    async fn put_auction(&self, doc: Value) -> Result<Value, StoreError>;

    /// 병합 패치 적용 후 저장 (수정 시각 갱신, 새 변경 순번 부여)
    async fn patch_auction(&self, auction_id: &str, patch: &Value) -> Result<Value, StoreError>;
}
// endregion: --- Store Trait

// region:    --- Helpers
/// 인덱스 값 생성
pub(crate) fn index_value(doc: &Value) -> Map<String, Value> {
    INDEXED_FIELDS
        .iter()
        .filter_map(|field| doc.get(*field).map(|v| (field.to_string(), v.clone())))
        .collect()
}

/// 수정 시각 뷰 키 (시각 + 문서 id, 같은 시각끼리도 유일)
pub(crate) fn date_modified_key(date_modified: &str, id: &str) -> String {
    format!("{}{}", date_modified, id)
}

/// 문서 id 추출
pub(crate) fn doc_id(doc: &Value) -> Result<String, StoreError> {
    doc.get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(StoreError::MissingId)
}

/// 테스트 경매 여부
pub(crate) fn doc_is_test(doc: &Value) -> bool {
    doc.get("mode").and_then(Value::as_str) == Some(crate::auction::model::MODE_TEST)
}
// endregion: --- Helpers
