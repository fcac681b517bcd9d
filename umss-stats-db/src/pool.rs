use std::sync::Arc;
use std::time::Duration;

use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod, Runtime};
use log::info;
use tokio::time::timeout;
use tokio_postgres::{
    NoTls,
    config::{Config, SslMode},
};

use umss_stats_config::DbConfig;
use umss_stats_error::{Result, StatsError};

/// db 풀 인스턴스
#[derive(Clone)]
pub struct DatabasePool {
    pool: Arc<Pool>,
    probe_timeout: Duration,
}

impl DatabasePool {
    /// db 풀 생성 후 연결 확인
    pub async fn new(dbconfig: &DbConfig) -> Result<Self> {
        info!("db 풀 초기화");

        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };
        let mgr = Manager::from_config(pg_config(dbconfig), NoTls, mgr_config);

        let pool = Pool::builder(mgr)
            .max_size(dbconfig.pool.max_connections)
            .runtime(Runtime::Tokio1)
            .recycle_timeout(Some(Duration::from_secs(dbconfig.pool.recycle_seconds)))
            .build()
            .map_err(|e| StatsError::Database(format!("db 풀 생성 실패: {e}")))?;

        let pool = Self {
            pool: Arc::new(pool),
            probe_timeout: Duration::from_secs(dbconfig.pool.connection_timeout_seconds),
        };
        pool.probe().await?;

        info!(
            "데이터베이스 연결 풀 준비 완료 (최대 연결 수: {})",
            dbconfig.pool.max_connections
        );

        Ok(pool)
    }

    /// 연결 확인
    ///
    /// 풀에서 연결 하나를 꺼내 SELECT 1 을 실행한다. 설정된 타임아웃을
    /// 넘기면 기동을 막지 않도록 바로 에러를 올린다.
    async fn probe(&self) -> Result<()> {
        let conn = self.get_connection().await?;
        timeout(self.probe_timeout, conn.query_one("SELECT 1", &[])).await??;
        Ok(())
    }

    /// 연결 풀에서 연결 가져오기
    pub async fn get_connection(&self) -> Result<deadpool_postgres::Object> {
        Ok(self.pool.get().await?)
    }

    /// 연결 풀 상태 정보
    pub fn pool_status(&self) -> PoolStatus {
        let status = self.pool.status();
        PoolStatus {
            size: status.size,
            available: status.available,
            waiting: status.waiting,
        }
    }
}

/// `PostgreSQL` 연결 설정 생성
///
/// 하이퍼테이블 전환(migrate_data)과 전체 범위 백필은 서버 기본
/// statement_timeout 을 넘길 수 있어 이 풀의 세션에서는 끈다.
fn pg_config(dbconfig: &DbConfig) -> Config {
    let ssl_mode = match dbconfig.connection.sslmode.to_lowercase().as_str() {
        "disable" => SslMode::Disable,
        "require" => SslMode::Require,
        _ => SslMode::Prefer,
    };

    let mut pg_config = Config::new();
    pg_config
        .host(dbconfig.connection.host.as_str())
        .port(dbconfig.connection.port)
        .dbname(dbconfig.connection.database.as_str())
        .user(dbconfig.connection.user.as_str())
        .password(dbconfig.connection.password.as_str())
        .application_name(dbconfig.connection.application_name.as_str())
        .options("-c statement_timeout=0")
        .ssl_mode(ssl_mode)
        .connect_timeout(Duration::from_secs(
            dbconfig.pool.connection_timeout_seconds,
        ))
        .keepalives(true);

    pg_config
}

/// 연결 풀 상태 정보
#[derive(Debug, Clone)]
pub struct PoolStatus {
    pub size: usize,
    pub available: usize,
    pub waiting: usize,
}

/// 데이터베이스 풀 초기화 함수
pub async fn initialize_dbpool(config: &DbConfig) -> Result<DatabasePool> {
    DatabasePool::new(config).await
}
