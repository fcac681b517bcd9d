use log::{debug, error, info};

use umss_stats_error::Result;

use crate::pool::DatabasePool;
use crate::sql::{library_item_events, playback_events, playback_sessions};

/// 기본 스키마 테이블 목록, 생성 순서 고정
///
/// playback_events 가 playback_sessions 에 외래키를 걸기 때문에 순서가
/// 중요하다.
const TABLES: [(&str, &str, &[&str]); 3] = [
    (
        "playback_sessions",
        playback_sessions::CREATE_TABLE,
        &playback_sessions::CREATE_INDICES,
    ),
    (
        "playback_events",
        playback_events::CREATE_TABLE,
        &playback_events::CREATE_INDICES,
    ),
    (
        "library_item_events",
        library_item_events::CREATE_TABLE,
        &library_item_events::CREATE_INDICES,
    ),
];

/// 데이터베이스 초기화
///
/// 기본 테이블과 일반 인덱스만 만든다. 하이퍼테이블 전환과 집계 뷰는
/// 분석 수렴 단계에서 처리된다. 테이블 하나의 실패가 나머지 생성을
/// 막지 않는다.
pub async fn initialize_db(pool: &DatabasePool) -> Result<()> {
    debug!("데이터베이스 기본 스키마 확인");

    let conn = pool.get_connection().await?;

    for (name, create_query, indices) in TABLES {
        if let Err(e) = conn.execute(create_query, &[]).await {
            error!("{name} 테이블 생성중 오류 발생: {e}");
            continue;
        }
        info!("{name} 테이블 확인 완료");

        for index_query in indices {
            if let Err(e) = conn.execute(*index_query, &[]).await {
                error!("{name} 인덱스 생성 실패: {e}");
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sessions_table_precedes_its_dependents() {
        let sessions = TABLES
            .iter()
            .position(|(name, _, _)| *name == "playback_sessions")
            .unwrap();
        let events = TABLES
            .iter()
            .position(|(name, _, _)| *name == "playback_events")
            .unwrap();
        assert!(sessions < events);
    }

    #[test]
    fn all_statements_are_idempotent() {
        for (_, create_query, indices) in TABLES {
            assert!(create_query.contains("IF NOT EXISTS"));
            for index_query in indices {
                assert!(index_query.contains("IF NOT EXISTS"));
            }
        }
    }
}
