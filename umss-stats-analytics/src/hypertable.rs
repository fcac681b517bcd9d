use deadpool_postgres::Object;
use log::{debug, info};

use umss_stats_error::Result;

use crate::ident::SafeIdent;
use crate::probe::CapabilityProber;
use crate::registry::FactTable;

/// 하이퍼테이블 전환 쿼리
fn create_hypertable_sql(table: FactTable) -> String {
    format!(
        "SELECT create_hypertable('{}', '{}', \
         chunk_time_interval => INTERVAL '{}', \
         migrate_data => TRUE, if_not_exists => TRUE)",
        table.table_name(),
        table.time_column(),
        table.chunk_interval()
    )
}

/// 전환 후 복원하는 복합 인덱스
///
/// 기본키 수술로 깨진 두 조회 경로를 되살린다. COALESCE 묶음 표현식은
/// 생성 컬럼 없이 표현식 인덱스로 태운다.
const PLAYBACK_POST_INDICES: [&str; 2] = [
    "CREATE INDEX IF NOT EXISTS playback_sessions_bucket_group_idx \
     ON playback_sessions (started_at DESC, (COALESCE(reference_id, id)))",
    "CREATE INDEX IF NOT EXISTS playback_sessions_user_group_idx \
     ON playback_sessions (user_id, (COALESCE(reference_id, id)))",
];

/// 사실 테이블을 하이퍼테이블로 전환
///
/// 이미 전환된 테이블이면 아무것도 하지 않는다. true 반환은 이번
/// 호출에서 전환이 수행되었다는 뜻이다.
pub async fn ensure_hypertable(conn: &Object, table: FactTable) -> Result<bool> {
    let prober = CapabilityProber::new(conn);
    if prober.is_hypertable(table.table_name()).await {
        debug!("{} 이미 하이퍼테이블, 전환 생략", table.table_name());
        return Ok(false);
    }

    // 기본키에 파티션 컬럼이 들어가야 전환이 가능하다
    if table == FactTable::PlaybackSessions {
        prepare_primary_key(conn).await?;
    }

    conn.execute(create_hypertable_sql(table).as_str(), &[])
        .await?;
    info!(
        "{} 하이퍼테이블 전환 완료 (청크 간격 {})",
        table.table_name(),
        table.chunk_interval()
    );

    if table == FactTable::PlaybackSessions {
        for index_query in PLAYBACK_POST_INDICES {
            conn.execute(index_query, &[]).await?;
        }
    }

    Ok(true)
}

/// 기본키에 파티션 컬럼을 포함시키는 수술
///
/// 이미 (id, started_at) 복합키면 나머지 단계 전부 생략한다.
async fn prepare_primary_key(conn: &Object) -> Result<()> {
    if primary_key_includes_time(conn).await? {
        debug!("playback_sessions 기본키에 started_at 이미 포함");
        return Ok(());
    }

    replace_dependent_foreign_keys(conn).await?;
    rebuild_primary_key(conn).await?;

    Ok(())
}

/// 기본키 컬럼에 started_at 포함 여부
async fn primary_key_includes_time(conn: &Object) -> Result<bool> {
    let rows = conn
        .query(
            "SELECT a.attname \
             FROM pg_index i \
             JOIN pg_attribute a ON a.attrelid = i.indrelid AND a.attnum = ANY(i.indkey) \
             WHERE i.indrelid = 'playback_sessions'::regclass AND i.indisprimary",
            &[],
        )
        .await?;

    for row in rows {
        let column: String = row.try_get(0)?;
        if column == "started_at" {
            return Ok(true);
        }
    }

    Ok(false)
}

/// playback_events 의 외래키를 일반 인덱스로 대체
///
/// 하이퍼테이블은 외래키 대상이 될 수 없다. 제약을 제거하고 같은 컬럼의
/// 인덱스로 조회 성능을 유지한다. 이후 관계 무결성은 애플리케이션
/// 불변식이다.
async fn replace_dependent_foreign_keys(conn: &Object) -> Result<()> {
    let rows = conn
        .query(
            "SELECT conname FROM pg_constraint \
             WHERE contype = 'f' \
               AND confrelid = 'playback_sessions'::regclass \
               AND conrelid = 'playback_events'::regclass",
            &[],
        )
        .await?;

    for row in rows {
        let raw: String = row.try_get(0)?;
        let constraint = SafeIdent::new(&raw)?;
        let sql =
            format!("ALTER TABLE playback_events DROP CONSTRAINT IF EXISTS {constraint}");
        conn.execute(sql.as_str(), &[]).await?;
        info!("playback_events 외래키 제거: {constraint}");
    }

    conn.execute(
        "CREATE INDEX IF NOT EXISTS playback_events_session_id_idx \
         ON playback_events(session_id)",
        &[],
    )
    .await?;

    Ok(())
}

/// 기본키를 (id, started_at) 복합키로 교체
async fn rebuild_primary_key(conn: &Object) -> Result<()> {
    let rows = conn
        .query(
            "SELECT conname FROM pg_constraint \
             WHERE contype = 'p' AND conrelid = 'playback_sessions'::regclass",
            &[],
        )
        .await?;

    for row in rows {
        let raw: String = row.try_get(0)?;
        let constraint = SafeIdent::new(&raw)?;
        let sql =
            format!("ALTER TABLE playback_sessions DROP CONSTRAINT IF EXISTS {constraint}");
        conn.execute(sql.as_str(), &[]).await?;
        info!("playback_sessions 기본키 제거: {constraint}");
    }

    conn.execute(
        "ALTER TABLE playback_sessions ADD PRIMARY KEY (id, started_at)",
        &[],
    )
    .await?;
    info!("playback_sessions 기본키 (id, started_at) 재생성");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversion_sql_is_guarded_and_migrates() {
        let sql = create_hypertable_sql(FactTable::PlaybackSessions);
        assert!(sql.contains("create_hypertable('playback_sessions', 'started_at'"));
        assert!(sql.contains("INTERVAL '7 days'"));
        assert!(sql.contains("migrate_data => TRUE"));
        assert!(sql.contains("if_not_exists => TRUE"));
    }

    #[test]
    fn secondary_table_uses_daily_chunks() {
        let sql = create_hypertable_sql(FactTable::LibraryItemEvents);
        assert!(sql.contains("create_hypertable('library_item_events', 'recorded_at'"));
        assert!(sql.contains("INTERVAL '1 day'"));
    }

    #[test]
    fn post_indices_cover_both_access_paths() {
        assert!(PLAYBACK_POST_INDICES[0].contains("started_at DESC"));
        for index_query in PLAYBACK_POST_INDICES {
            assert!(index_query.contains("(COALESCE(reference_id, id))"));
            assert!(index_query.contains("IF NOT EXISTS"));
        }
    }
}
