use std::collections::HashSet;

use deadpool_postgres::Object;
use log::{debug, error, warn};

use umss_stats_db::DatabasePool;
use umss_stats_error::Result;

use crate::compress;
use crate::hypertable;
use crate::materialize;
use crate::meta;
use crate::probe::CapabilityProber;
use crate::rebuild::{self, ProgressFn, RebuildOutcome};
use crate::registry::{self, AGGREGATE_REGISTRY_VERSION, AGGREGATES, AggregateDef, FactTable};

/// 현재 분석 스키마 상태 스냅샷
#[derive(Debug, Clone, Default)]
pub struct AnalyticsStatus {
    pub extension_installed: bool,
    pub fact_table_is_hypertable: bool,
    pub compression_enabled: bool,
    pub existing_aggregates: Vec<String>,
    pub chunk_count: i64,
}

/// 수렴 실행 결과, 작업 로그 포함
#[derive(Debug, Clone, Default)]
pub struct ConvergeReport {
    pub success: bool,
    pub status: AnalyticsStatus,
    pub actions: Vec<String>,
}

/// 작업 로그 기록
fn act(actions: &mut Vec<String>, message: String) {
    debug!("분석 수렴: {message}");
    actions.push(message);
}

/// 분석 스키마를 목표 상태로 수렴
///
/// 프로세스 기동마다 호출하며 반복 호출해도 안전하다. 에러를 밖으로
/// 던지지 않고 항상 구조화된 결과를 반환한다. 분석은 부가 기능이라
/// 수렴이 실패해도 서비스 기동은 계속되어야 한다.
pub async fn converge(pool: &DatabasePool) -> ConvergeReport {
    let mut actions = Vec::new();

    let conn = match pool.get_connection().await {
        Ok(conn) => conn,
        Err(e) => {
            let message = format!("DB 연결 실패로 분석 수렴 중단: {e}");
            error!("{message}");
            actions.push(message);
            return ConvergeReport {
                success: false,
                status: AnalyticsStatus::default(),
                actions,
            };
        }
    };

    let success = match converge_inner(&conn, &mut actions).await {
        Ok(()) => true,
        Err(e) => {
            let message = format!("분석 수렴 실패: {e}");
            error!("{message}");
            actions.push(message);
            false
        }
    };

    let status = snapshot(&conn).await;
    ConvergeReport {
        success,
        status,
        actions,
    }
}

/// 수렴 본문, 구조 변경 실패는 에러로 올라가 호출자가 잡는다
async fn converge_inner(conn: &Object, actions: &mut Vec<String>) -> Result<()> {
    let prober = CapabilityProber::new(conn);

    // 확장이 없으면 서브시스템 전체가 선택 사항이다
    if !prober.extension_installed().await {
        act(
            actions,
            "timescaledb 확장 미설치, 분석 수렴 건너뜀 (실패 아님)".to_string(),
        );
        return Ok(());
    }

    // toolkit 은 설치 가능하면 기회주의적으로 켠다, 실패는 치명적이지 않음
    if !prober.toolkit_installed().await && prober.toolkit_available().await {
        match conn
            .execute("CREATE EXTENSION IF NOT EXISTS timescaledb_toolkit", &[])
            .await
        {
            Ok(_) => act(actions, "timescaledb_toolkit 확장 설치".to_string()),
            Err(e) => {
                warn!("timescaledb_toolkit 설치 실패, 정확 집계로 대체: {e}");
                act(actions, format!("toolkit 설치 실패, 정확 집계 사용: {e}"));
            }
        }
    }

    meta::ensure_meta_table(conn).await?;

    if !prober
        .table_exists(FactTable::PlaybackSessions.table_name())
        .await
    {
        act(
            actions,
            "playback_sessions 테이블 없음, 분석 수렴 건너뜀".to_string(),
        );
        return Ok(());
    }

    // 구조 전환은 집계 생성보다 먼저 끝나야 한다
    if hypertable::ensure_hypertable(conn, FactTable::PlaybackSessions).await? {
        act(actions, "playback_sessions 하이퍼테이블 전환".to_string());
    } else {
        act(
            actions,
            "playback_sessions 하이퍼테이블 이미 전환됨".to_string(),
        );
    }

    let secondary_exists = prober
        .table_exists(FactTable::LibraryItemEvents.table_name())
        .await;
    if secondary_exists {
        if hypertable::ensure_hypertable(conn, FactTable::LibraryItemEvents).await? {
            act(actions, "library_item_events 하이퍼테이블 전환".to_string());
        } else {
            act(
                actions,
                "library_item_events 하이퍼테이블 이미 전환됨".to_string(),
            );
        }
    } else {
        // 마이그레이션 순서 경합, 다음 수렴 때 마저 처리된다
        act(
            actions,
            "library_item_events 테이블 없음, 보조 설정 건너뜀".to_string(),
        );
    }

    // 파티셔닝 도입 전 설치가 남긴 일반 뷰 정리
    for def in AGGREGATES.iter() {
        if materialize::drop_if_regular_view(conn, def.name).await? {
            act(actions, format!("{} 구버전 일반 뷰 제거", def.name));
        }
    }

    let use_toolkit = prober.toolkit_installed().await;
    let stored = prober.stored_registry_version().await;
    let current = AGGREGATE_REGISTRY_VERSION;
    let defs = applicable_defs(secondary_exists);

    if rebuild::needs_full_rebuild(stored, current) {
        act(
            actions,
            format!("레지스트리 버전 변경 감지 ({stored} -> {current}), 전체 재구축 시작"),
        );
        rebuild::rebuild_all(conn, &defs, use_toolkit, None).await?;
        act(actions, format!("전체 재구축 완료, 버전 {current} 기록"));
    } else {
        // 신규 설치 또는 버전 일치, 없는 집계만 만든다
        let mut existing: HashSet<String> = HashSet::new();
        for table in [FactTable::PlaybackSessions, FactTable::LibraryItemEvents] {
            existing.extend(prober.continuous_aggregate_names(table.table_name()).await);
        }

        for def in &defs {
            if existing.contains(def.name) {
                act(actions, format!("{} 집계 이미 존재", def.name));
            } else {
                materialize::create_aggregate(conn, def, use_toolkit).await?;
                act(actions, format!("{} 집계 생성", def.name));
            }
            materialize::install_refresh_policy(conn, def).await?;
        }
        act(actions, "리프레시 정책 설치 완료".to_string());

        let available: HashSet<&str> = defs.iter().map(|d| d.name).collect();
        for view in registry::derived_views_for(&available) {
            materialize::create_derived_view(conn, view).await?;
        }
        act(actions, "파생 뷰 갱신 완료".to_string());

        if stored != current {
            meta::store_registry_version(conn, current).await?;
            act(actions, format!("레지스트리 버전 {current} 기록"));
        }
    }

    // 압축/보존은 정책만 설치하고 실행은 엔진 스케줄러가 맡는다
    if compress::enable_compression(conn, FactTable::PlaybackSessions).await? {
        act(actions, "playback_sessions 압축 설정".to_string());
    } else {
        act(actions, "playback_sessions 압축 이미 설정됨".to_string());
    }

    if secondary_exists {
        if compress::enable_compression(conn, FactTable::LibraryItemEvents).await? {
            act(actions, "library_item_events 압축 설정".to_string());
        } else {
            act(actions, "library_item_events 압축 이미 설정됨".to_string());
        }
        if compress::install_retention(conn, FactTable::LibraryItemEvents).await? {
            act(
                actions,
                "library_item_events 보존 정책 보장 (365 days)".to_string(),
            );
        }
    }

    Ok(())
}

/// 소스 테이블이 존재하는 집계 정의만 고른다
///
/// 보조 테이블이 아직 없으면 그 집계는 이번 수렴에서 제외되고, 테이블이
/// 생긴 뒤의 수렴이 나머지를 채운다.
fn applicable_defs(secondary_exists: bool) -> Vec<&'static AggregateDef> {
    AGGREGATES
        .iter()
        .filter(|d| d.source == FactTable::PlaybackSessions || secondary_exists)
        .collect()
}

/// 현재 상태 스냅샷, 모든 조회는 실패 시 안전한 기본값을 쓴다
async fn snapshot(conn: &Object) -> AnalyticsStatus {
    let prober = CapabilityProber::new(conn);
    let primary = FactTable::PlaybackSessions.table_name();

    let mut names = prober.continuous_aggregate_names(primary).await;
    names.extend(
        prober
            .continuous_aggregate_names(FactTable::LibraryItemEvents.table_name())
            .await,
    );
    names.sort();

    AnalyticsStatus {
        extension_installed: prober.extension_installed().await,
        fact_table_is_hypertable: prober.is_hypertable(primary).await,
        compression_enabled: prober.compression_enabled(primary).await,
        existing_aggregates: names,
        chunk_count: prober.chunk_count(primary).await,
    }
}

/// 현재 상태 조회, 운영 대시보드용이며 언제든 호출해도 안전하다
pub async fn get_status(pool: &DatabasePool) -> Result<AnalyticsStatus> {
    let conn = pool.get_connection().await?;
    Ok(snapshot(&conn).await)
}

/// 대량 적재 후 전체 집계 즉시 구체화
///
/// 다음 스케줄 창을 기다리지 않는다. 집계 하나의 실패가 나머지를 막지
/// 않도록 개별 실패는 기록만 하고 넘어간다.
pub async fn refresh_all(pool: &DatabasePool) {
    let conn = match pool.get_connection().await {
        Ok(conn) => conn,
        Err(e) => {
            error!("DB 연결 실패로 전체 리프레시 중단: {e}");
            return;
        }
    };

    for def in AGGREGATES.iter() {
        match materialize::refresh_full_range(&conn, def.name).await {
            Ok(()) => debug!("{} 전체 리프레시 완료", def.name),
            Err(e) => error!("{} 리프레시 실패, 계속 진행: {e}", def.name),
        }
    }
}

/// 운영자 강제 재구축
///
/// 레지스트리 버전 변경 없이 전체 재구축을 돌리는 비상 수단이다.
/// 수동으로 깨진 뷰를 복구할 때 쓴다.
pub async fn rebuild(pool: &DatabasePool, progress: Option<&ProgressFn>) -> RebuildOutcome {
    let conn = match pool.get_connection().await {
        Ok(conn) => conn,
        Err(e) => {
            return RebuildOutcome {
                success: false,
                message: format!("DB 연결 실패: {e}"),
            };
        }
    };

    let prober = CapabilityProber::new(&conn);
    if !prober.extension_installed().await {
        return RebuildOutcome {
            success: false,
            message: "timescaledb 확장 미설치".to_string(),
        };
    }

    if let Err(e) = meta::ensure_meta_table(&conn).await {
        return RebuildOutcome {
            success: false,
            message: format!("메타데이터 테이블 생성 실패: {e}"),
        };
    }

    let use_toolkit = prober.toolkit_installed().await;
    let secondary_exists = prober
        .table_exists(FactTable::LibraryItemEvents.table_name())
        .await;
    let defs = applicable_defs(secondary_exists);

    match rebuild::rebuild_all(&conn, &defs, use_toolkit, progress).await {
        Ok(()) => RebuildOutcome {
            success: true,
            message: "전체 재구축 완료".to_string(),
        },
        Err(e) => RebuildOutcome {
            success: false,
            message: format!("재구축 실패: {e}"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secondary_defs_excluded_until_table_exists() {
        let without = applicable_defs(false);
        assert!(
            without
                .iter()
                .all(|d| d.source == FactTable::PlaybackSessions)
        );

        let with = applicable_defs(true);
        assert_eq!(with.len(), AGGREGATES.len());
    }
}
