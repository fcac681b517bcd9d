use deadpool_postgres::Object;
use log::info;

use umss_stats_error::Result;

use crate::probe::CapabilityProber;
use crate::registry::{AggregateDef, DerivedViewDef};

/// 연속 집계 생성 쿼리
///
/// WITH NO DATA 로 스키마만 만든다. 데이터는 첫 스케줄 리프레시나
/// 명시적 백필이 채운다.
fn create_aggregate_sql(def: &AggregateDef, use_toolkit: bool) -> String {
    let body = if use_toolkit {
        def.primary_query
    } else {
        def.fallback_query
    };
    format!(
        "CREATE MATERIALIZED VIEW IF NOT EXISTS {} \
         WITH (timescaledb.continuous) AS {} \
         WITH NO DATA",
        def.name, body
    )
}

/// 리프레시 정책 등록 쿼리, 실행은 엔진 스케줄러가 맡는다
fn refresh_policy_sql(def: &AggregateDef) -> String {
    format!(
        "SELECT add_continuous_aggregate_policy('{}', \
         start_offset => INTERVAL '{}', \
         end_offset => INTERVAL '{}', \
         schedule_interval => INTERVAL '{}', \
         if_not_exists => TRUE)",
        def.name,
        def.refresh.start_offset,
        def.refresh.end_offset,
        def.refresh.schedule_interval
    )
}

/// 전체 범위 리프레시 쿼리
fn full_refresh_sql(name: &str) -> String {
    format!("CALL refresh_continuous_aggregate('{name}', NULL, NULL)")
}

/// 파생 뷰 생성 쿼리
fn create_view_sql(view: &DerivedViewDef) -> String {
    format!("CREATE OR REPLACE VIEW {} AS {}", view.name, view.query)
}

/// 연속 집계 생성
pub async fn create_aggregate(
    conn: &Object,
    def: &AggregateDef,
    use_toolkit: bool,
) -> Result<()> {
    conn.execute(create_aggregate_sql(def, use_toolkit).as_str(), &[])
        .await?;
    Ok(())
}

/// 리프레시 정책 설치
pub async fn install_refresh_policy(conn: &Object, def: &AggregateDef) -> Result<()> {
    conn.execute(refresh_policy_sql(def).as_str(), &[]).await?;
    Ok(())
}

/// 집계 삭제, 종속 파생 뷰도 함께 삭제된다
pub async fn drop_aggregate(conn: &Object, name: &str) -> Result<()> {
    let sql = format!("DROP MATERIALIZED VIEW IF EXISTS {name} CASCADE");
    conn.execute(sql.as_str(), &[]).await?;
    Ok(())
}

/// 전체 범위 즉시 구체화
pub async fn refresh_full_range(conn: &Object, name: &str) -> Result<()> {
    conn.execute(full_refresh_sql(name).as_str(), &[]).await?;
    Ok(())
}

/// 파생 뷰 생성 또는 교체
pub async fn create_derived_view(conn: &Object, view: &DerivedViewDef) -> Result<()> {
    conn.execute(create_view_sql(view).as_str(), &[]).await?;
    Ok(())
}

/// 같은 이름의 일반 머티리얼라이즈드 뷰가 있으면 제거
///
/// 파티셔닝 도입 전 설치가 남긴 뷰 자리에 연속 집계를 만들 수 있게
/// 한다. 연속 집계로 이미 등록된 이름은 건드리지 않는다.
pub async fn drop_if_regular_view(conn: &Object, name: &str) -> Result<bool> {
    let prober = CapabilityProber::new(conn);

    if !prober.materialized_view_exists(name).await {
        return Ok(false);
    }
    if prober.is_continuous_aggregate(name).await {
        return Ok(false);
    }

    let sql = format!("DROP MATERIALIZED VIEW IF EXISTS {name} CASCADE");
    conn.execute(sql.as_str(), &[]).await?;
    info!("{name} 일반 머티리얼라이즈드 뷰 제거, 연속 집계로 교체 예정");

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::AGGREGATES;

    #[test]
    fn aggregate_sql_selects_variant_by_toolkit() {
        let def = &AGGREGATES[0];
        let with_toolkit = create_aggregate_sql(def, true);
        let without = create_aggregate_sql(def, false);

        assert!(with_toolkit.contains("hyperloglog"));
        assert!(!without.contains("hyperloglog"));
        assert!(without.contains("count(DISTINCT"));

        for sql in [&with_toolkit, &without] {
            assert!(sql.starts_with(&format!(
                "CREATE MATERIALIZED VIEW IF NOT EXISTS {}",
                def.name
            )));
            assert!(sql.contains("WITH (timescaledb.continuous)"));
            assert!(sql.ends_with("WITH NO DATA"));
        }
    }

    #[test]
    fn refresh_policy_sql_uses_engine_scheduler() {
        let def = &AGGREGATES[0];
        let sql = refresh_policy_sql(def);
        assert!(sql.contains("add_continuous_aggregate_policy('playback_stats_daily'"));
        assert!(sql.contains(&format!(
            "start_offset => INTERVAL '{}'",
            def.refresh.start_offset
        )));
        assert!(sql.contains(&format!(
            "end_offset => INTERVAL '{}'",
            def.refresh.end_offset
        )));
        assert!(sql.contains(&format!(
            "schedule_interval => INTERVAL '{}'",
            def.refresh.schedule_interval
        )));
        assert!(sql.contains("if_not_exists => TRUE"));
    }

    #[test]
    fn full_refresh_covers_whole_range() {
        let sql = full_refresh_sql("playback_stats_daily");
        assert_eq!(
            sql,
            "CALL refresh_continuous_aggregate('playback_stats_daily', NULL, NULL)"
        );
    }

    #[test]
    fn derived_view_sql_is_replaceable() {
        let view = &crate::registry::DERIVED_VIEWS[0];
        let sql = create_view_sql(view);
        assert!(sql.starts_with(&format!("CREATE OR REPLACE VIEW {} AS", view.name)));
    }
}
