use deadpool_postgres::Object;
use log::debug;
use tokio_postgres::types::ToSql;

use crate::meta;

/// 카탈로그 조회 실패, 확장 미설치 등으로 카탈로그 뷰 자체가 없는 경우
///
/// 치명적 에러가 아니라 "기능 없음" 분기로 취급한다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilityAbsent;

type ProbeResult<T> = std::result::Result<T, CapabilityAbsent>;

/// 런타임 환경과 기존 객체 상태를 읽기 전용으로 조사한다
///
/// 모든 공개 메서드는 조회 실패 시 안전한 기본값(false/0/빈 목록)을
/// 반환한다. 상태는 매번 데이터베이스에서 다시 읽으며 프로세스 메모리에
/// 캐시하지 않는다.
pub struct CapabilityProber<'a> {
    conn: &'a Object,
}

impl<'a> CapabilityProber<'a> {
    pub fn new(conn: &'a Object) -> Self {
        Self { conn }
    }

    /// 단일 bool 값 조회
    async fn scalar_bool(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> ProbeResult<bool> {
        match self.conn.query_one(sql, params).await {
            Ok(row) => row.try_get::<_, bool>(0).map_err(|_| CapabilityAbsent),
            Err(e) => {
                debug!("카탈로그 조회 실패, 기능 없음으로 간주: {e}");
                Err(CapabilityAbsent)
            }
        }
    }

    /// 단일 i64 값 조회
    async fn scalar_i64(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> ProbeResult<i64> {
        match self.conn.query_one(sql, params).await {
            Ok(row) => row.try_get::<_, i64>(0).map_err(|_| CapabilityAbsent),
            Err(e) => {
                debug!("카탈로그 조회 실패, 기능 없음으로 간주: {e}");
                Err(CapabilityAbsent)
            }
        }
    }

    /// 첫번째 컬럼 문자열 목록 조회
    async fn column_strings(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> ProbeResult<Vec<String>> {
        match self.conn.query(sql, params).await {
            Ok(rows) => rows
                .iter()
                .map(|row| row.try_get::<_, String>(0).map_err(|_| CapabilityAbsent))
                .collect(),
            Err(e) => {
                debug!("카탈로그 조회 실패, 기능 없음으로 간주: {e}");
                Err(CapabilityAbsent)
            }
        }
    }

    /// timescaledb 확장 설치 여부
    pub async fn extension_installed(&self) -> bool {
        self.scalar_bool(
            "SELECT count(*) > 0 FROM pg_extension WHERE extname = 'timescaledb'",
            &[],
        )
        .await
        .unwrap_or(false)
    }

    /// timescaledb_toolkit 확장 설치 여부
    pub async fn toolkit_installed(&self) -> bool {
        self.scalar_bool(
            "SELECT count(*) > 0 FROM pg_extension WHERE extname = 'timescaledb_toolkit'",
            &[],
        )
        .await
        .unwrap_or(false)
    }

    /// timescaledb_toolkit 설치 가능 여부
    pub async fn toolkit_available(&self) -> bool {
        self.scalar_bool(
            "SELECT count(*) > 0 FROM pg_available_extensions WHERE name = 'timescaledb_toolkit'",
            &[],
        )
        .await
        .unwrap_or(false)
    }

    /// 테이블 존재 여부
    pub async fn table_exists(&self, table: &str) -> bool {
        self.scalar_bool("SELECT to_regclass($1) IS NOT NULL", &[&table])
            .await
            .unwrap_or(false)
    }

    /// 하이퍼테이블 전환 여부
    pub async fn is_hypertable(&self, table: &str) -> bool {
        self.scalar_bool(
            "SELECT count(*) > 0 FROM timescaledb_information.hypertables \
             WHERE hypertable_name = $1",
            &[&table],
        )
        .await
        .unwrap_or(false)
    }

    /// 현재 청크 수
    pub async fn chunk_count(&self, table: &str) -> i64 {
        self.scalar_i64(
            "SELECT count(*) FROM timescaledb_information.chunks \
             WHERE hypertable_name = $1",
            &[&table],
        )
        .await
        .unwrap_or(0)
    }

    /// 압축 설정 여부
    pub async fn compression_enabled(&self, table: &str) -> bool {
        self.scalar_bool(
            "SELECT compression_enabled FROM timescaledb_information.hypertables \
             WHERE hypertable_name = $1",
            &[&table],
        )
        .await
        .unwrap_or(false)
    }

    /// 하이퍼테이블에 정의된 연속 집계 이름 목록
    pub async fn continuous_aggregate_names(&self, table: &str) -> Vec<String> {
        self.column_strings(
            "SELECT view_name FROM timescaledb_information.continuous_aggregates \
             WHERE hypertable_name = $1 ORDER BY view_name",
            &[&table],
        )
        .await
        .unwrap_or_default()
    }

    /// 이름이 연속 집계로 등록되어 있는지
    pub async fn is_continuous_aggregate(&self, name: &str) -> bool {
        self.scalar_bool(
            "SELECT count(*) > 0 FROM timescaledb_information.continuous_aggregates \
             WHERE view_name = $1",
            &[&name],
        )
        .await
        .unwrap_or(false)
    }

    /// 이름이 일반 머티리얼라이즈드 뷰로 존재하는지
    ///
    /// 파티셔닝 도입 전 버전이 남긴 뷰를 찾는 용도다.
    pub async fn materialized_view_exists(&self, name: &str) -> bool {
        self.scalar_bool(
            "SELECT count(*) > 0 FROM pg_matviews WHERE matviewname = $1",
            &[&name],
        )
        .await
        .unwrap_or(false)
    }

    /// 저장된 레지스트리 버전, 기록 없거나 조회 실패면 0
    pub async fn stored_registry_version(&self) -> i64 {
        meta::stored_registry_version(self.conn).await
    }
}
