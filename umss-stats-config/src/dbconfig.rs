use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use umss_stats_error::Result;

/// 데이터베이스 설정
///
/// 설정파일에 빠진 항목은 기본값으로 채워진다.
#[derive(Default, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    /// 데이터베이스 연결 설정
    pub connection: ConnectionConfig,
    /// 연결 풀 설정
    pub pool: PoolConfig,
}

impl DbConfig {
    /// 설정파일에서 db 설정 로드
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: DbConfig = serde_yml::from_str(&contents)?;

        Ok(config)
    }
}

/// db 연결설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
    pub sslmode: String,
    /// pg_stat_activity 에서 수렴 세션을 구분하는 이름
    pub application_name: String,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            database: "umssdb".to_string(),
            user: "dbadmin".to_string(),
            password: "dbadminpass".to_string(),
            sslmode: "disable".to_string(),
            application_name: "ustats".to_string(),
        }
    }
}

/// 데이터베이스 연결 풀 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// 최대 연결 수
    pub max_connections: usize,
    /// 연결 타임아웃(초)
    pub connection_timeout_seconds: u64,
    /// 연결 재사용 전 대기 시간(초)
    pub recycle_seconds: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10, // 수렴 작업은 순차 실행이라 크게 필요 없음
            connection_timeout_seconds: 30,  // 연결 시도 타임아웃 30초
            recycle_seconds: 21_600,    // 6시간마다 연결 갱신
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_fills_defaults() {
        let config: DbConfig =
            serde_yml::from_str("connection:\n  host: db.internal\n").unwrap();
        assert_eq!(config.connection.host, "db.internal");
        assert_eq!(config.connection.port, 5432);
        assert_eq!(config.pool.max_connections, 10);
    }

    #[test]
    fn default_session_is_identifiable() {
        let config = DbConfig::default();
        assert_eq!(config.connection.application_name, "ustats");
        assert_eq!(config.connection.sslmode, "disable");
    }
}
