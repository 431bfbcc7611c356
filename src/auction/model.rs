use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// region:    --- Status
/// 결과 보고가 허용되는 유일한 경매 상태
pub const AUCTION_STATUS_ACTIVE_AUCTION: &str = "active.auction";

/// 활성 상태 (랏, 입찰, 랏별 입찰값 공통)
pub const STATUS_ACTIVE: &str = "active";

/// 테스트 경매 표시값 (`mode` 필드)
pub const MODE_TEST: &str = "test";

/// 상태가 비어 있으면 active 로 간주 (구버전 문서는 status 를 생략함)
fn effective_status(status: Option<&str>) -> &str {
    match status {
        Some(status) if !status.is_empty() => status,
        _ => STATUS_ACTIVE,
    }
}

/// 수정 시각 포맷 (UTC, 밀리초, 사전순 = 시간순)
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}
// endregion: --- Status

// region:    --- Aggregate
/// 경매 애그리거트
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Auction {
    pub id: String,
    pub status: String,
    #[serde(rename = "dateModified", default, skip_serializing_if = "Option::is_none")]
    pub date_modified: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lots: Vec<Lot>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bids: Vec<Bid>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Auction {
    pub fn lot(&self, lot_id: &str) -> Option<&Lot> {
        self.lots.iter().find(|lot| lot.id == lot_id)
    }
}

/// 랏 (독립적으로 낙찰될 수 있는 경매의 하위 단위)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lot {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Lot {
    pub fn is_active(&self) -> bool {
        effective_status(self.status.as_deref()) == STATUS_ACTIVE
    }
}

/// 입찰
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bid {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(rename = "lotValues", default, skip_serializing_if = "Vec::is_empty")]
    pub lot_values: Vec<LotValue>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Bid {
    pub fn is_active(&self) -> bool {
        effective_status(self.status.as_deref()) == STATUS_ACTIVE
    }
}

/// 특정 랏에 대한 입찰값
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LotValue {
    #[serde(rename = "relatedLot", default, skip_serializing_if = "Option::is_none")]
    pub related_lot: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl LotValue {
    pub fn is_active(&self) -> bool {
        effective_status(self.status.as_deref()) == STATUS_ACTIVE
    }
}
// endregion: --- Aggregate
