/// PostgreSQL 기반 경매 저장소
/// 뷰는 auctions 테이블의 (date_modified, id) / (seq, id) 인덱스 범위 조회로 구현
// region:    --- Imports
use super::{
    doc_id, doc_is_test, format_timestamp, index_value, AuctionStore, ScanBoundary, ScanRequest,
    ViewKey, ViewRow,
};
use crate::auction::patch::apply_patch;
use crate::database::DatabaseManager;
use crate::error::StoreError;
use crate::listing::{Feed, Mode};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::{Postgres, QueryBuilder, Row};
use std::sync::Arc;
use tracing::{debug, info};

// endregion: --- Imports

// region:    --- Queries
/// 수정 시각 뷰 키 식 (인덱스 식과 동일해야 함)
/// 바이트 순 비교를 위해 "C" collation 사용
const DATE_MODIFIED_KEY: &str = r#"((date_modified || id) COLLATE "C")"#;

const GET_AUCTION: &str = "SELECT doc FROM auctions WHERE id = $1";

const GET_AUCTION_FOR_UPDATE: &str = "SELECT doc FROM auctions WHERE id = $1 FOR UPDATE";

const UPSERT_AUCTION: &str = r#"
    INSERT INTO auctions (id, doc, date_modified, is_test, seq)
    VALUES ($1, $2, $3, $4, nextval('auctions_seq'))
    ON CONFLICT (id) DO UPDATE
    SET doc = EXCLUDED.doc,
        date_modified = EXCLUDED.date_modified,
        is_test = EXCLUDED.is_test,
        seq = nextval('auctions_seq')
"#;

const UPDATE_AUCTION: &str = r#"
    UPDATE auctions
    SET doc = $2, date_modified = $3, is_test = $4, seq = nextval('auctions_seq')
    WHERE id = $1
"#;
// endregion: --- Queries

pub struct PgAuctionStore {
    db_manager: Arc<DatabaseManager>,
}

impl PgAuctionStore {
    pub fn new(db_manager: Arc<DatabaseManager>) -> Self {
        Self { db_manager }
    }

    /// 뷰 범위 조회 쿼리 구성
    /// 수정 시각 뷰의 키는 `date_modified || id` 이므로 같은 시각의 행도 키로 구분된다.
    fn scan_query(request: &ScanRequest) -> QueryBuilder<'_, Postgres> {
        let direction = if request.descending { "DESC" } else { "ASC" };
        let comparison = if request.descending { "<=" } else { ">=" };
        let order_by = match request.view.feed {
            Feed::DateModified => format!("{} {}", DATE_MODIFIED_KEY, direction),
            Feed::Changes => format!("seq {}, id {}", direction, direction),
        };

        let mut query = QueryBuilder::new(format!(
            "SELECT id, doc, seq, {} AS view_key FROM auctions WHERE TRUE",
            DATE_MODIFIED_KEY
        ));
        match request.view.mode {
            Mode::Real => {
                query.push(" AND NOT is_test");
            }
            Mode::Test => {
                query.push(" AND is_test");
            }
            Mode::All => {}
        }
        match &request.start {
            ScanBoundary::Key(key) => {
                query
                    .push(format!(" AND {} {} ", DATE_MODIFIED_KEY, comparison))
                    .push_bind(key.as_str());
            }
            ScanBoundary::Seq(seq) => {
                query.push(format!(" AND seq {} ", comparison)).push_bind(*seq);
            }
            // 최신 경계는 내림차순에서만 의미가 있음 (상한 없음)
            ScanBoundary::Latest if request.descending => {}
            ScanBoundary::Latest => {
                query.push(" AND FALSE");
            }
        }
        query
            .push(format!(" ORDER BY {} LIMIT ", order_by))
            .push_bind(request.limit as i64);
        query
    }

    fn to_view_row(request: &ScanRequest, row: &PgRow) -> Result<ViewRow, sqlx::Error> {
        let doc: Value = row.try_get("doc")?;
        let key = match request.view.feed {
            Feed::DateModified => ViewKey::Text(row.try_get("view_key")?),
            Feed::Changes => ViewKey::Seq(row.try_get("seq")?),
        };
        Ok(ViewRow {
            key,
            id: row.try_get("id")?,
            value: index_value(&doc),
            doc: request.include_docs.then_some(doc),
        })
    }
}

#[async_trait]
impl AuctionStore for PgAuctionStore {
    async fn scan(&self, request: &ScanRequest) -> Result<Vec<ViewRow>, StoreError> {
        let mut query = Self::scan_query(request);
        let rows = query.build().fetch_all(self.db_manager.pool.as_ref()).await?;
        debug!(
            "{:<12} --> 뷰 조회: view={}, start={}, rows={}",
            "PgStore",
            request.view.name,
            request.start,
            rows.len()
        );
        rows.iter()
            .map(|row| Self::to_view_row(request, row).map_err(StoreError::from))
            .collect()
    }

    async fn get_auction(&self, auction_id: &str) -> Result<Option<Value>, StoreError> {
        let row = sqlx::query(GET_AUCTION)
            .bind(auction_id)
            .fetch_optional(self.db_manager.pool.as_ref())
            .await?;
        Ok(row.map(|row| row.try_get::<Value, _>("doc")).transpose()?)
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
        sqlx::query(UPSERT_AUCTION)
            .bind(&id)
            .bind(&doc)
            .bind(&date_modified)
            .bind(doc_is_test(&doc))
            .execute(self.db_manager.pool.as_ref())
            .await?;
        info!("{:<12} --> 경매 저장: id={}", "PgStore", id);
        Ok(doc)
    }

    async fn patch_auction(&self, auction_id: &str, patch: &Value) -> Result<Value, StoreError> {
        let auction_id = auction_id.to_string();
        let patch = patch.clone();
        self.db_manager
            .transaction(|tx| {
                Box::pin(async move {
                    let row = sqlx::query(GET_AUCTION_FOR_UPDATE)
                        .bind(&auction_id)
                        .fetch_optional(&mut **tx)
                        .await?
                        .ok_or_else(|| StoreError::NotFound(auction_id.clone()))?;
                    let mut doc: Value = row.try_get("doc")?;

                    apply_patch(&mut doc, &patch);
                    let now = format_timestamp(Utc::now());
                    doc["dateModified"] = Value::String(now.clone());

                    sqlx::query(UPDATE_AUCTION)
                        .bind(&auction_id)
                        .bind(&doc)
                        .bind(&now)
                        .bind(doc_is_test(&doc))
                        .execute(&mut **tx)
                        .await?;
                    info!("{:<12} --> 경매 패치 저장: id={}", "PgStore", auction_id);
                    Ok(doc)
                })
            })
            .await
    }
}
