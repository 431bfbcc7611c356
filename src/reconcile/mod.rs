/// 경매 결과 검증 및 정규화
/// 1. 경매 / 랏 상태 확인
/// 2. 제출된 입찰, 랏을 저장된 순서로 재정렬 (집합이 다르면 거부)
/// 3. 랏별 입찰값 구조 검증
/// 4. 요청 범위 밖의 항목은 빈 객체로 가림
/// 5. 결과 보고(확정) 요청이면 종료 시각 기록
// region:    --- Imports
use crate::auction::model::{format_timestamp, Auction, Bid, AUCTION_STATUS_ACTIVE_AUCTION};
use crate::error::ReconcileError;
use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use tracing::debug;

// endregion: --- Imports

// region:    --- Modules
pub mod ordering;

use ordering::{canonical_order, OrderMismatch};
// endregion: --- Modules

// region:    --- Action
/// 요청 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportAction {
    /// 결과 보고 (확정, 종료 시각 기록)
    Finalize,
    /// 부분 수정
    Update,
}

impl ReportAction {
    fn describe(&self) -> &'static str {
        match self {
            Self::Finalize => "report auction results",
            Self::Update => "update auction urls",
        }
    }
}
// endregion: --- Action

// region:    --- Result Reconciler
/// 저장된 경매 스냅샷 기준의 결과 검증기
pub struct ResultReconciler<'a> {
    auction: &'a Auction,
    lot_id: Option<&'a str>,
}

impl<'a> ResultReconciler<'a> {
    pub fn new(auction: &'a Auction, lot_id: Option<&'a str>) -> Self {
        Self { auction, lot_id }
    }

    /// 검증 후 저장 가능한 패치 생성 (저장된 경매는 변경하지 않음)
    pub fn reconcile(
        &self,
        action: ReportAction,
        payload: Option<Map<String, Value>>,
        now: DateTime<Utc>,
    ) -> Result<Value, ReconcileError> {
        self.check_state(action)?;

        let mut data = match payload {
            Some(data) => self.reconcile_payload(data)?,
            None => Map::new(),
        };

        if action == ReportAction::Finalize {
            let period = json!({ "auctionPeriod": { "endDate": format_timestamp(now) } });
            if self.auction.lots.is_empty() {
                data.insert("auctionPeriod".to_string(), period["auctionPeriod"].clone());
            } else {
                let lots = self
                    .auction
                    .lots
                    .iter()
                    .map(|lot| {
                        if self.in_scope(&lot.id) {
                            period.clone()
                        } else {
                            empty()
                        }
                    })
                    .collect();
                data.insert("lots".to_string(), Value::Array(lots));
            }
        }

        Ok(Value::Object(data))
    }

    fn in_scope(&self, lot_id: &str) -> bool {
        self.lot_id == Some(lot_id)
    }

    fn check_state(&self, action: ReportAction) -> Result<(), ReconcileError> {
        if self.auction.status != AUCTION_STATUS_ACTIVE_AUCTION {
            return Err(ReconcileError::InvalidState {
                action: action.describe(),
                status: self.auction.status.clone(),
            });
        }
        if let Some(lot_id) = self.lot_id {
            let lot = self
                .auction
                .lot(lot_id)
                .ok_or(ReconcileError::LotNotFound)?;
            if !lot.is_active() {
                return Err(ReconcileError::LotNotActive {
                    action: action.describe(),
                });
            }
        }
        Ok(())
    }

    fn reconcile_payload(
        &self,
        mut data: Map<String, Value>,
    ) -> Result<Map<String, Value>, ReconcileError> {
        let stored_bid_ids: Vec<&str> = self.auction.bids.iter().map(|b| b.id.as_str()).collect();
        let bids = canonical_order(&stored_bid_ids, take_array(&mut data, "bids"), entity_id)
            .map_err(|mismatch| match mismatch {
                OrderMismatch::Count { expected, actual } => {
                    ReconcileError::BidCountMismatch { expected, actual }
                }
                OrderMismatch::Identity => ReconcileError::BidSetMismatch,
            })?;

        let has_lots = data
            .get("lots")
            .and_then(Value::as_array)
            .is_some_and(|lots| !lots.is_empty());
        if has_lots {
            let stored_lot_ids: Vec<&str> =
                self.auction.lots.iter().map(|l| l.id.as_str()).collect();
            let lots = canonical_order(&stored_lot_ids, take_array(&mut data, "lots"), entity_id)
                .map_err(|mismatch| match mismatch {
                    OrderMismatch::Count { expected, actual } => {
                        ReconcileError::LotCountMismatch { expected, actual }
                    }
                    OrderMismatch::Identity => ReconcileError::LotSetMismatch,
                })?;
            let lots = lots
                .into_iter()
                .map(|lot| match entity_id(&lot) {
                    Some(id) if self.in_scope(id) => lot,
                    _ => empty(),
                })
                .collect();
            data.insert("lots".to_string(), Value::Array(lots));
        }

        let mut bids = bids;
        if !self.auction.lots.is_empty() {
            for (bid, stored) in bids.iter().zip(&self.auction.bids) {
                if stored.is_active() {
                    check_lot_values(bid, stored)?;
                }
            }
            for (bid, stored) in bids.iter_mut().zip(&self.auction.bids) {
                self.redact_lot_values(bid, stored);
            }
        }
        data.insert("bids".to_string(), Value::Array(bids));

        debug!(
            "{:<12} --> 결과 검증 완료: auction={}, lot={:?}",
            "Reconcile", self.auction.id, self.lot_id
        );
        Ok(data)
    }

    /// 범위 내 랏이면서 저장된 입찰값이 active 인 위치만 남김
    fn redact_lot_values(&self, bid: &mut Value, stored: &Bid) {
        let Some(Value::Array(lot_values)) = bid.get_mut("lotValues") else {
            return;
        };
        // 저장된 위치 수를 넘는 항목은 병합 시 뒤에 추가되므로 잘라냄
        lot_values.truncate(stored.lot_values.len());
        for (position, lot_value) in lot_values.iter_mut().enumerate() {
            let related_in_scope = lot_value
                .get("relatedLot")
                .and_then(Value::as_str)
                .is_some_and(|related| self.in_scope(related));
            let stored_active = stored
                .lot_values
                .get(position)
                .is_some_and(|stored| stored.is_active());
            if !(related_in_scope && stored_active) {
                *lot_value = empty();
            }
        }
    }
}
// endregion: --- Result Reconciler

// region:    --- Helpers
/// 랏별 입찰값 개수 및 위치별 relatedLot 일치 확인
fn check_lot_values(bid: &Value, stored: &Bid) -> Result<(), ReconcileError> {
    let submitted = bid
        .get("lotValues")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    if submitted.len() != stored.lot_values.len() {
        return Err(ReconcileError::LotValuesCountMismatch {
            bid_id: stored.id.clone(),
        });
    }
    for (position, (submitted, stored_value)) in submitted.iter().zip(&stored.lot_values).enumerate()
    {
        let related = submitted.get("relatedLot").and_then(Value::as_str);
        if related != stored_value.related_lot.as_deref() {
            return Err(ReconcileError::RelatedLotMismatch {
                bid_id: stored.id.clone(),
                position,
            });
        }
    }
    Ok(())
}

fn entity_id(entity: &Value) -> Option<&str> {
    entity.get("id").and_then(Value::as_str)
}

fn take_array(data: &mut Map<String, Value>, key: &str) -> Vec<Value> {
    match data.remove(key) {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    }
}

fn empty() -> Value {
    Value::Object(Map::new())
}
// endregion: --- Helpers
