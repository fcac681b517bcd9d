use deadpool_postgres::Object;
use log::debug;

use umss_stats_error::Result;

/// 레지스트리 버전이 저장되는 키
pub const VERSION_KEY: &str = "aggregate_registry_version";

/// 메타데이터 테이블 생성 쿼리
const CREATE_META_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS analytics_meta (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )";

/// 메타데이터 테이블 보장, 최초 사용 시 생성
pub async fn ensure_meta_table(conn: &Object) -> Result<()> {
    conn.execute(CREATE_META_TABLE, &[]).await?;
    Ok(())
}

/// 저장된 레지스트리 버전 조회
///
/// 기록이 없거나 조회에 실패하면 0, 즉 신규 설치로 간주한다.
pub async fn stored_registry_version(conn: &Object) -> i64 {
    let row = conn
        .query_opt(
            "SELECT value FROM analytics_meta WHERE key = $1",
            &[&VERSION_KEY],
        )
        .await;

    match row {
        Ok(Some(row)) => match row.try_get::<_, String>(0) {
            Ok(raw) => parse_version(&raw),
            Err(_) => 0,
        },
        Ok(None) => 0,
        Err(e) => {
            debug!("레지스트리 버전 조회 실패, 0으로 간주: {e}");
            0
        }
    }
}

/// 레지스트리 버전 기록
pub async fn store_registry_version(conn: &Object, version: i64) -> Result<()> {
    let value = version.to_string();
    conn.execute(
        "INSERT INTO analytics_meta (key, value, updated_at) VALUES ($1, $2, NOW()) \
         ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()",
        &[&VERSION_KEY, &value],
    )
    .await?;
    Ok(())
}

/// 저장값 파싱, 손상된 값은 0
fn parse_version(raw: &str) -> i64 {
    raw.trim().parse().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_stored_versions() {
        assert_eq!(parse_version("3"), 3);
        assert_eq!(parse_version(" 17 "), 17);
        assert_eq!(parse_version("0"), 0);
    }

    #[test]
    fn corrupt_values_read_as_fresh_install() {
        assert_eq!(parse_version(""), 0);
        assert_eq!(parse_version("abc"), 0);
        assert_eq!(parse_version("3.5"), 0);
    }
}
