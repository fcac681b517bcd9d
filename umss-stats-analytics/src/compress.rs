use deadpool_postgres::Object;
use log::debug;

use umss_stats_error::Result;

use crate::probe::CapabilityProber;
use crate::registry::FactTable;

/// 압축 속성 설정 쿼리
fn compression_settings_sql(table: FactTable) -> String {
    format!(
        "ALTER TABLE {} SET (timescaledb.compress, \
         timescaledb.compress_segmentby = '{}')",
        table.table_name(),
        table.segment_by()
    )
}

/// 압축 정책 등록 쿼리
fn compression_policy_sql(table: FactTable) -> String {
    format!(
        "SELECT add_compression_policy('{}', INTERVAL '{}', if_not_exists => TRUE)",
        table.table_name(),
        table.compress_after()
    )
}

/// 보존 정책 등록 쿼리, 보존 기간이 없는 테이블은 None
fn retention_policy_sql(table: FactTable) -> Option<String> {
    table.retention_period().map(|period| {
        format!(
            "SELECT add_retention_policy('{}', INTERVAL '{}', if_not_exists => TRUE)",
            table.table_name(),
            period
        )
    })
}

/// 압축 설정 및 정책 설치
///
/// 이미 압축이 켜진 테이블은 속성 변경을 건너뛴다. 압축된 청크가 있으면
/// segment_by 변경을 엔진이 거부한다. true 반환은 이번 호출에서 압축을
/// 새로 설정했다는 뜻이다.
pub async fn enable_compression(conn: &Object, table: FactTable) -> Result<bool> {
    let prober = CapabilityProber::new(conn);
    let already = prober.compression_enabled(table.table_name()).await;

    if already {
        debug!("{} 압축 이미 설정됨", table.table_name());
    } else {
        conn.execute(compression_settings_sql(table).as_str(), &[])
            .await?;
    }

    // 정책 등록은 if_not_exists 라 매번 호출해도 안전하다
    conn.execute(compression_policy_sql(table).as_str(), &[])
        .await?;

    Ok(!already)
}

/// 보존 정책 설치, 보존 기간이 정의되지 않은 테이블이면 false
pub async fn install_retention(conn: &Object, table: FactTable) -> Result<bool> {
    match retention_policy_sql(table) {
        Some(sql) => {
            conn.execute(sql.as_str(), &[]).await?;
            Ok(true)
        }
        None => Ok(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn playback_compression_segments_by_server_and_user() {
        let sql = compression_settings_sql(FactTable::PlaybackSessions);
        assert!(sql.contains("ALTER TABLE playback_sessions"));
        assert!(sql.contains("timescaledb.compress_segmentby = 'server_id, user_id'"));

        let policy = compression_policy_sql(FactTable::PlaybackSessions);
        assert!(policy.contains("add_compression_policy('playback_sessions', INTERVAL '7 days'"));
        assert!(policy.contains("if_not_exists => TRUE"));
    }

    #[test]
    fn library_compression_waits_for_enrichment() {
        let sql = compression_settings_sql(FactTable::LibraryItemEvents);
        assert!(sql.contains("timescaledb.compress_segmentby = 'server_id, library_id'"));

        let policy = compression_policy_sql(FactTable::LibraryItemEvents);
        assert!(policy.contains("INTERVAL '3 days'"));
    }

    #[test]
    fn retention_only_on_secondary_table() {
        assert!(retention_policy_sql(FactTable::PlaybackSessions).is_none());

        let sql = retention_policy_sql(FactTable::LibraryItemEvents).unwrap();
        assert!(sql.contains("add_retention_policy('library_item_events', INTERVAL '365 days'"));
        assert!(sql.contains("if_not_exists => TRUE"));
    }
}
