use std::error::Error as StdError;
use std::fmt;
use std::io;

use deadpool_postgres::PoolError;
use serde_yml::Error as YmlError;
use tokio::time::error::Elapsed;
use tokio_postgres::Error as PgError;

/// UMSS 통계 서비스의 모든 에러 타입을 정의합니다.
#[derive(Debug)]
pub enum StatsError {
    /// 설정 관련 에러
    Config(String),

    /// 입출력 에러
    Io(io::Error),

    /// 데이터베이스 관련 에러
    Database(String),

    /// 분석 스키마 수렴 관련 에러
    Analytics(String),

    /// 타임아웃 에러
    Timeout(String),
}

impl fmt::Display for StatsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatsError::Config(msg) => write!(f, "설정 에러: {}", msg),
            StatsError::Io(err) => write!(f, "I/O 에러: {}", err),
            StatsError::Database(msg) => write!(f, "데이터베이스 에러: {}", msg),
            StatsError::Analytics(msg) => write!(f, "분석 스키마 에러: {}", msg),
            StatsError::Timeout(msg) => write!(f, "타임아웃 에러: {}", msg),
        }
    }
}

impl StdError for StatsError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            StatsError::Io(err) => Some(err),
            _ => None,
        }
    }
}

/// Result 타입 별칭 정의
pub type Result<T> = std::result::Result<T, StatsError>;

/// From 트레이트 구현으로 다양한 에러 타입을 StatsError로 변환
impl From<io::Error> for StatsError {
    fn from(err: io::Error) -> Self {
        StatsError::Io(err)
    }
}

impl From<PoolError> for StatsError {
    fn from(err: PoolError) -> Self {
        StatsError::Database(format!("DB 풀 에러: {}", err))
    }
}

impl From<PgError> for StatsError {
    fn from(err: PgError) -> Self {
        StatsError::Database(format!("PostgreSQL 에러: {}", err))
    }
}

impl From<Elapsed> for StatsError {
    fn from(err: Elapsed) -> Self {
        StatsError::Timeout(format!("작업 타임아웃: {}", err))
    }
}

impl From<YmlError> for StatsError {
    fn from(err: YmlError) -> Self {
        StatsError::Config(format!("YAML 파싱 에러: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as StdError;
    use std::io;

    use super::*;

    #[test]
    fn display_carries_the_message() {
        let err = StatsError::Analytics("재구축 실패".to_string());
        assert_eq!(format!("{err}"), "분석 스키마 에러: 재구축 실패");
    }

    #[test]
    fn io_errors_keep_their_source() {
        let err = StatsError::from(io::Error::new(io::ErrorKind::NotFound, "config.yml"));
        assert!(err.source().is_some());
    }
}
