/// 경매 목록 커서
/// 1. 요청 파라미터 → 뷰 선택, 시작 경계, 방향, 개수
/// 2. 범위 조회 결과 → 데이터 + 다음/이전 페이지 커서
/// 조회 자체(I/O)는 호출자가 수행한다.
// region:    --- Imports
use crate::error::ListingError;
use crate::store::{ScanBoundary, ScanRequest, ViewKey, ViewRow, ViewSpec, INDEXED_FIELDS};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use url::form_urlencoded;

// endregion: --- Imports

// region:    --- Modules
pub mod token;

use token::TokenCipher;
// endregion: --- Modules

pub const DEFAULT_LIMIT: usize = 100;
pub const MAX_LIMIT: usize = 1000;
pub const MAX_LIMIT_WITH_FIELDS: usize = 100;

/// 수정 시각 피드 내림차순 시작 키 (모든 ISO-8601 시각보다 사전순으로 뒤)
const DESCENDING_START_KEY: &str = "9";

// region:    --- Feed / Mode
/// 정렬 기준
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feed {
    DateModified,
    Changes,
}

impl Feed {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "dateModified" => Some(Self::DateModified),
            "changes" => Some(Self::Changes),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DateModified => "dateModified",
            Self::Changes => "changes",
        }
    }
}

/// 목록 변형 (실경매 / 테스트 / 전체)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Real,
    Test,
    All,
}

impl Mode {
    /// 빈 문자열은 기본값(Real)이며 파라미터로 명시된 것으로 보지 않는다
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "test" => Some(Self::Test),
            "_all_" => Some(Self::All),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Real => "",
            Self::Test => "test",
            Self::All => "_all_",
        }
    }
}
// endregion: --- Feed / Mode

// region:    --- View Registry
const DEFAULT_VIEW: ViewSpec = ViewSpec {
    name: "auctions_real_by_dateModified",
    feed: Feed::DateModified,
    mode: Mode::Real,
};

/// (피드, 모드) → 뷰 매핑. 시작 시 한 번 구성되고 이후 변경되지 않음
#[derive(Debug, Clone)]
pub struct ViewRegistry {
    views: HashMap<(Feed, Mode), ViewSpec>,
}

impl ViewRegistry {
    pub fn new(views: impl IntoIterator<Item = ViewSpec>) -> Self {
        Self {
            views: views.into_iter().map(|v| ((v.feed, v.mode), v)).collect(),
        }
    }

    /// 기본 뷰 6종
    pub fn standard() -> Self {
        Self::new([
            ViewSpec { name: "auctions_real_by_dateModified", feed: Feed::DateModified, mode: Mode::Real },
            ViewSpec { name: "auctions_test_by_dateModified", feed: Feed::DateModified, mode: Mode::Test },
            ViewSpec { name: "auctions_by_dateModified", feed: Feed::DateModified, mode: Mode::All },
            ViewSpec { name: "auctions_real_by_local_seq", feed: Feed::Changes, mode: Mode::Real },
            ViewSpec { name: "auctions_test_by_local_seq", feed: Feed::Changes, mode: Mode::Test },
            ViewSpec { name: "auctions_by_local_seq", feed: Feed::Changes, mode: Mode::All },
        ])
    }

    pub fn contains(&self, feed: Feed, mode: Mode) -> bool {
        self.views.contains_key(&(feed, mode))
    }

    /// 등록되지 않은 모드는 해당 피드의 기본(Real) 뷰로 대체
    pub fn resolve(&self, feed: Feed, mode: Mode) -> ViewSpec {
        self.views
            .get(&(feed, mode))
            .or_else(|| self.views.get(&(feed, Mode::Real)))
            .copied()
            .unwrap_or(DEFAULT_VIEW)
    }
}
// endregion: --- View Registry

// region:    --- Offset
/// 해석된 페이지 커서
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Offset {
    /// 수정 시각 피드: 원문 그대로의 시작 키
    Raw(String),
    /// 변경 피드: 토큰을 복호화한 변경 순번
    Encrypted(i64),
}

impl Offset {
    fn to_key(&self) -> ViewKey {
        match self {
            Self::Raw(key) => ViewKey::Text(key.clone()),
            Self::Encrypted(seq) => ViewKey::Seq(*seq),
        }
    }
}

/// 커서 → 범위 조회 시작 경계
pub fn resolve_boundary(offset: Option<&Offset>, feed: Feed, descending: bool) -> ScanBoundary {
    match (offset, feed) {
        (Some(Offset::Raw(key)), _) => ScanBoundary::Key(key.clone()),
        (Some(Offset::Encrypted(seq)), _) => ScanBoundary::Seq(*seq),
        (None, Feed::Changes) if descending => ScanBoundary::Latest,
        (None, Feed::Changes) => ScanBoundary::Seq(0),
        (None, Feed::DateModified) if descending => {
            ScanBoundary::Key(DESCENDING_START_KEY.to_string())
        }
        (None, Feed::DateModified) => ScanBoundary::Key(String::new()),
    }
}

/// 요청 개수 해석 (숫자가 아니거나 범위를 벗어나면 기본값)
pub fn resolve_limit(raw: Option<&str>, with_fields: bool) -> usize {
    let max = if with_fields { MAX_LIMIT_WITH_FIELDS } else { MAX_LIMIT };
    raw.filter(|s| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|s| s.parse::<usize>().ok())
        .filter(|limit| (1..=max).contains(limit))
        .unwrap_or(DEFAULT_LIMIT)
}
// endregion: --- Offset

// region:    --- Request / Response
/// 목록 요청 쿼리 파라미터 (모두 선택)
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ListingParams {
    pub opt_fields: Option<String>,
    pub limit: Option<String>,
    pub descending: Option<String>,
    pub offset: Option<String>,
    pub feed: Option<String>,
    pub mode: Option<String>,
}

/// 해석된 목록 요청
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingQuery {
    pub view: ViewSpec,
    pub feed: Feed,
    pub descending: bool,
    pub limit: usize,
    pub fields: Vec<String>,
    pub offset: Option<Offset>,
    /// 링크 재구성용 원본 값
    raw_fields: Option<String>,
    raw_limit: Option<String>,
    raw_offset: Option<String>,
    explicit_feed: Option<Feed>,
    explicit_mode: Option<Mode>,
}

impl ListingQuery {
    /// 인덱스 값만으로 투영할 수 없어 문서 전체를 읽어야 하는지
    pub fn uses_custom_fields(&self) -> bool {
        !self.fields.is_empty()
            && !self
                .fields
                .iter()
                .all(|field| INDEXED_FIELDS.contains(&field.as_str()))
    }

    fn view_fields(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .map(String::as_str)
            .chain(["dateModified", "id"])
    }
}

/// 목록 조회 계획 (해석된 요청 + 범위 조회 요청)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingPlan {
    pub query: ListingQuery,
    pub scan: ScanRequest,
}

/// 페이지 링크
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageLink {
    pub offset: String,
    pub path: String,
    pub uri: String,
}

/// 목록 응답
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingPage {
    pub data: Vec<Map<String, Value>>,
    pub next_page: PageLink,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev_page: Option<PageLink>,
}
// endregion: --- Request / Response

// region:    --- Listing Cursor
/// 목록 커서 설정 + 토큰 암호화
pub struct ListingCursor {
    registry: ViewRegistry,
    cipher: Arc<dyn TokenCipher>,
    instance_key: String,
    namespace: String,
    route_path: String,
    public_url: String,
}

impl ListingCursor {
    pub fn new(
        registry: ViewRegistry,
        cipher: Arc<dyn TokenCipher>,
        instance_key: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            cipher,
            instance_key: instance_key.into(),
            namespace: namespace.into(),
            route_path: "/auctions".to_string(),
            public_url: "http://localhost".to_string(),
        }
    }

    /// 링크 생성에 쓰는 경로 / 공개 URL 지정
    pub fn with_links(mut self, route_path: impl Into<String>, public_url: impl Into<String>) -> Self {
        self.route_path = route_path.into();
        self.public_url = public_url.into().trim_end_matches('/').to_string();
        self
    }

    /// 변경 순번 → 토큰
    pub fn encode_seq(&self, seq: i64) -> Result<String, ListingError> {
        self.cipher
            .encrypt(&self.instance_key, &self.namespace, &seq.to_string())
    }

    /// 토큰 → 변경 순번
    pub fn decode_seq(&self, token: &str) -> Result<i64, ListingError> {
        self.cipher
            .decrypt(&self.instance_key, &self.namespace, token)
            .filter(|plain| !plain.is_empty() && plain.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|plain| plain.parse::<i64>().ok())
            .ok_or(ListingError::InvalidOffset)
    }

    /// 피드 종류에 따라 커서 해석
    pub fn decode_offset(&self, raw: &str, feed: Feed) -> Result<Offset, ListingError> {
        match feed {
            Feed::Changes => self.decode_seq(raw).map(Offset::Encrypted),
            Feed::DateModified => Ok(Offset::Raw(raw.to_string())),
        }
    }

    /// 요청 파라미터 → 조회 계획
    /// 잘못된 파라미터는 기본값으로 대체되며, 실패는 변경 피드 커서가 유효하지 않을 때뿐이다.
    pub fn plan(&self, params: &ListingParams) -> Result<ListingPlan, ListingError> {
        let raw_fields = params.opt_fields.clone().filter(|s| !s.is_empty());
        let fields: Vec<String> = raw_fields
            .as_deref()
            .map(|s| s.split(',').map(str::to_string).collect())
            .unwrap_or_default();
        let raw_limit = params.limit.clone().filter(|s| !s.is_empty());
        let limit = resolve_limit(raw_limit.as_deref(), !fields.is_empty());
        let descending = params.descending.as_deref().is_some_and(|s| !s.is_empty());
        let raw_offset = params.offset.clone().filter(|s| !s.is_empty());

        let explicit_feed = params.feed.as_deref().and_then(Feed::parse);
        let requested_feed = explicit_feed.unwrap_or(Feed::DateModified);
        let explicit_mode = params
            .mode
            .as_deref()
            .and_then(Mode::parse)
            .filter(|mode| self.registry.contains(requested_feed, *mode));
        let view = self
            .registry
            .resolve(requested_feed, explicit_mode.unwrap_or(Mode::Real));
        let feed = view.feed;

        let offset = raw_offset
            .as_deref()
            .map(|raw| self.decode_offset(raw, feed))
            .transpose()?;
        let start = resolve_boundary(offset.as_ref(), feed, descending);

        let query = ListingQuery {
            view,
            feed,
            descending,
            limit,
            fields,
            offset,
            raw_fields,
            raw_limit,
            raw_offset,
            explicit_feed,
            explicit_mode,
        };
        let scan = ScanRequest {
            view,
            start,
            // 커서 행 자체를 감지해서 제외하기 위해 한 행 더 읽음
            limit: if query.offset.is_some() { limit + 1 } else { limit },
            descending,
            include_docs: query.uses_custom_fields(),
        };
        debug!(
            "{:<12} --> 조회 계획: view={}, start={}, limit={}, descending={}",
            "Listing", scan.view.name, scan.start, scan.limit, scan.descending
        );

        Ok(ListingPlan { query, scan })
    }

    /// 범위 조회 결과 → 응답 페이지
    pub fn paginate(&self, plan: &ListingPlan, rows: &[ViewRow]) -> Result<ListingPage, ListingError> {
        let query = &plan.query;
        let mut entries: Vec<(Map<String, Value>, &ViewKey)> = rows
            .iter()
            .map(|row| (self.project(query, row), &row.key))
            .collect();

        let (next_offset, prev_offset) = match (rows.first(), rows.last()) {
            (Some(first), Some(last)) => {
                let mut next_key = last.key.clone();
                let mut prev_key = first.key.clone();
                if let Some(offset) = &query.offset {
                    let boundary = offset.to_key();
                    if boundary == first.key {
                        entries.remove(0);
                    } else {
                        // 커서 행이 사라졌거나 이동함: 개수만 맞추고 커서 자체를 이전 경계로 사용
                        entries.truncate(query.limit);
                        if let Some((_, key)) = entries.last() {
                            next_key = (*key).clone();
                        }
                        prev_key = boundary;
                    }
                }
                (self.encode_key(&next_key)?, self.encode_key(&prev_key)?)
            }
            _ => {
                let raw = query.raw_offset.clone().unwrap_or_default();
                (raw.clone(), raw)
            }
        };

        let next_page = self.link(query, query.descending, next_offset);
        let prev_page = (query.descending || query.offset.is_some())
            .then(|| self.link(query, !query.descending, prev_offset));

        Ok(ListingPage {
            data: entries.into_iter().map(|(entry, _)| entry).collect(),
            next_page,
            prev_page,
        })
    }

    fn encode_key(&self, key: &ViewKey) -> Result<String, ListingError> {
        match key {
            ViewKey::Text(key) => Ok(key.clone()),
            ViewKey::Seq(seq) => self.encode_seq(*seq),
        }
    }

    /// 행 투영 ({id, dateModified} + 요청 필드)
    fn project(&self, query: &ListingQuery, row: &ViewRow) -> Map<String, Value> {
        if query.fields.is_empty() {
            let date_modified = row.value.get("dateModified").cloned().unwrap_or(Value::Null);
            let mut entry = Map::new();
            entry.insert("id".to_string(), Value::String(row.id.clone()));
            entry.insert("dateModified".to_string(), date_modified);
            return entry;
        }

        let source = match (&row.doc, query.uses_custom_fields()) {
            (Some(Value::Object(doc)), true) => doc.clone(),
            _ => {
                let mut value = row.value.clone();
                value.insert("id".to_string(), Value::String(row.id.clone()));
                value
            }
        };
        query
            .view_fields()
            .filter_map(|field| source.get(field).map(|v| (field.to_string(), v.clone())))
            .collect()
    }

    /// 페이지 링크 생성 (쿼리 순서: opt_fields, limit, descending, feed, mode, offset)
    fn link(&self, query: &ListingQuery, descending: bool, offset: String) -> PageLink {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        if let Some(fields) = &query.raw_fields {
            serializer.append_pair("opt_fields", fields);
        }
        if let Some(limit) = &query.raw_limit {
            serializer.append_pair("limit", limit);
        }
        if descending {
            serializer.append_pair("descending", "1");
        }
        if let Some(feed) = query.explicit_feed {
            serializer.append_pair("feed", feed.as_str());
        }
        if let Some(mode) = query.explicit_mode {
            serializer.append_pair("mode", mode.as_str());
        }
        serializer.append_pair("offset", &offset);

        let path = format!("{}?{}", self.route_path, serializer.finish());
        PageLink {
            uri: format!("{}{}", self.public_url, path),
            path,
            offset,
        }
    }
}
// endregion: --- Listing Cursor
