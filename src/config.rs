use crate::error::ConfigError;
use std::env;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_PUBLIC_URL: &str = "http://localhost:3000";
const DEFAULT_INSTANCE_KEY: &str = "auction-registry";
const DEFAULT_FEED_NAMESPACE: &str = "auctions";
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;

/// 환경 변수 기반 설정
#[derive(Debug, Clone)]
pub struct Settings {
    /// 없으면 메모리 저장소로 실행
    pub database_url: Option<String>,
    pub bind_addr: String,
    /// 페이지 링크 uri 의 기준 주소
    pub public_url: String,
    /// 커서 토큰이 묶이는 저장소 인스턴스 키
    pub instance_key: String,
    /// 커서 토큰 네임스페이스
    pub feed_namespace: String,
    pub db_max_connections: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: None,
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            public_url: DEFAULT_PUBLIC_URL.to_string(),
            instance_key: DEFAULT_INSTANCE_KEY.to_string(),
            feed_namespace: DEFAULT_FEED_NAMESPACE.to_string(),
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let db_max_connections = match env::var("DB_MAX_CONNECTIONS") {
            Ok(raw) => raw
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or(ConfigError::InvalidValue {
                    name: "DB_MAX_CONNECTIONS",
                    value: raw,
                })?,
            Err(_) => defaults.db_max_connections,
        };

        Ok(Self {
            database_url: env::var("DATABASE_URL").ok().filter(|s| !s.is_empty()),
            bind_addr: env::var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            public_url: env::var("PUBLIC_URL").unwrap_or(defaults.public_url),
            instance_key: env::var("INSTANCE_KEY").unwrap_or(defaults.instance_key),
            feed_namespace: env::var("FEED_NAMESPACE").unwrap_or(defaults.feed_namespace),
            db_max_connections,
        })
    }
}
