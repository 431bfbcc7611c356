/// 메모리 기반 경매 저장소 (테스트, 로컬 실행용)
// region:    --- Imports
use super::{
    date_modified_key, doc_id, doc_is_test, format_timestamp, index_value, AuctionStore,
    ScanRequest, ViewKey, ViewRow,
};
use crate::auction::patch::apply_patch;
use crate::error::StoreError;
use crate::listing::Feed;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

// endregion: --- Imports

struct Record {
    doc: Value,
    date_modified: String,
    seq: i64,
    is_test: bool,
}

#[derive(Default)]
struct State {
    records: HashMap<String, Record>,
    last_seq: i64,
}

impl State {
    fn store(&mut self, id: String, doc: Value, date_modified: String) -> Value {
        self.last_seq += 1;
        let record = Record {
            is_test: doc_is_test(&doc),
            doc: doc.clone(),
            date_modified,
            seq: self.last_seq,
        };
        self.records.insert(id, record);
        doc
    }
}

#[derive(Default)]
pub struct MemoryAuctionStore {
    state: RwLock<State>,
}

impl MemoryAuctionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuctionStore for MemoryAuctionStore {
    async fn scan(&self, request: &ScanRequest) -> Result<Vec<ViewRow>, StoreError> {
        let state = self.state.read().await;
        let mut rows: Vec<ViewRow> = state
            .records
            .iter()
            .filter(|(_, record)| request.view.includes(record.is_test))
            .map(|(id, record)| {
                let key = match request.view.feed {
                    Feed::DateModified => {
                        ViewKey::Text(date_modified_key(&record.date_modified, id))
                    }
                    Feed::Changes => ViewKey::Seq(record.seq),
                };
                ViewRow {
                    key,
                    id: id.clone(),
                    value: index_value(&record.doc),
                    doc: request.include_docs.then(|| record.doc.clone()),
                }
            })
            .filter(|row| request.admits(&row.key))
            .collect();

        rows.sort_by(|a, b| (&a.key, &a.id).cmp(&(&b.key, &b.id)));
        if request.descending {
            rows.reverse();
        }
        rows.truncate(request.limit);
        debug!(
            "{:<12} --> 메모리 뷰 조회: view={}, rows={}",
            "MemoryStore",
            request.view.name,
            rows.len()
        );
        Ok(rows)
    }

    async fn get_auction(&self, auction_id: &str) -> Result<Option<Value>, StoreError> {
        let state = self.state.read().await;
        Ok(state.records.get(auction_id).map(|record| record.doc.clone()))
    }

    async fn put_auction(&self, mut doc: Value) -> Result<Value, StoreError> {
        let id = doc_id(&doc)?;
        let date_modified = match doc.get("dateModified").and_then(Value::as_str) {
            Some(date_modified) => date_modified.to_string(),
            None => {
                let now = format_timestamp(Utc::now());
                doc["dateModified"] = Value::String(now.clone());
                now
            }
        };
        let mut state = self.state.write().await;
        Ok(state.store(id, doc, date_modified))
    }

    async fn patch_auction(&self, auction_id: &str, patch: &Value) -> Result<Value, StoreError> {
        let mut state = self.state.write().await;
        let mut doc = state
            .records
            .get(auction_id)
            .map(|record| record.doc.clone())
            .ok_or_else(|| StoreError::NotFound(auction_id.to_string()))?;

        apply_patch(&mut doc, patch);
        let now = format_timestamp(Utc::now());
        doc["dateModified"] = Value::String(now.clone());
        Ok(state.store(auction_id.to_string(), doc, now))
    }
}
