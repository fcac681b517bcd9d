use std::collections::HashSet;

/// 집계 정의 레지스트리 버전
///
/// 집계 쿼리나 리프레시 정책을 수정하면 반드시 이 값을 올린다.
/// 저장된 버전과 다르면 기동 시 전체 재구축이 실행된다.
pub const AGGREGATE_REGISTRY_VERSION: i64 = 3;

/// 사실 테이블 유형
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactTable {
    PlaybackSessions,
    LibraryItemEvents,
}

impl FactTable {
    /// 테이블 이름 반환
    pub const fn table_name(self) -> &'static str {
        match self {
            FactTable::PlaybackSessions => "playback_sessions",
            FactTable::LibraryItemEvents => "library_item_events",
        }
    }

    /// 파티션 기준 시각 컬럼
    pub const fn time_column(self) -> &'static str {
        match self {
            FactTable::PlaybackSessions => "started_at",
            FactTable::LibraryItemEvents => "recorded_at",
        }
    }

    /// 청크 간격
    pub const fn chunk_interval(self) -> &'static str {
        match self {
            FactTable::PlaybackSessions => "7 days",
            FactTable::LibraryItemEvents => "1 day",
        }
    }

    /// 압축 segment_by 컬럼 목록
    pub const fn segment_by(self) -> &'static str {
        match self {
            FactTable::PlaybackSessions => "server_id, user_id",
            FactTable::LibraryItemEvents => "server_id, library_id",
        }
    }

    /// 압축 유예 기간
    ///
    /// library_item_events 는 메타데이터 보강 작업이 끝날 시간을 준다.
    pub const fn compress_after(self) -> &'static str {
        match self {
            FactTable::PlaybackSessions => "7 days",
            FactTable::LibraryItemEvents => "3 days",
        }
    }

    /// 보존 기간, None 이면 만료 없음
    pub const fn retention_period(self) -> Option<&'static str> {
        match self {
            FactTable::PlaybackSessions => None,
            FactTable::LibraryItemEvents => Some("365 days"),
        }
    }
}

/// 리프레시 정책
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshPolicy {
    /// 과거로 얼마나 거슬러 올라가 구체화할지
    pub start_offset: &'static str,
    /// 현재 시각에서 얼마나 떨어진 지점에서 멈출지
    pub end_offset: &'static str,
    /// 엔진 스케줄러 실행 주기
    pub schedule_interval: &'static str,
}

/// 연속 집계 정의
///
/// primary_query 는 timescaledb_toolkit 의 hyperloglog 근사 고유값 집계를
/// 사용하고, fallback_query 는 정확한 count(DISTINCT) 로 같은 컬럼 구성을
/// 만든다. 두 쿼리의 출력 스키마는 반드시 동일해야 한다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregateDef {
    pub name: &'static str,
    pub source: FactTable,
    pub primary_query: &'static str,
    pub fallback_query: &'static str,
    pub refresh: RefreshPolicy,
}

/// 파생 뷰 정의
///
/// 파생 뷰는 자체 리프레시 정책이 없고 상위 집계가 재생성되면 함께
/// 재생성된다. depends_on 은 집계 이름 또는 다른 파생 뷰 이름이다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DerivedViewDef {
    pub name: &'static str,
    pub query: &'static str,
    pub depends_on: &'static [&'static str],
}

/// 일별 사용자 재생 통계 (toolkit)
const PLAYBACK_STATS_DAILY_PRIMARY: &str = "
    SELECT
        time_bucket(INTERVAL '1 day', started_at) AS bucket,
        server_id,
        user_id,
        distinct_count(hyperloglog(8192, COALESCE(reference_id, id))) AS play_count,
        sum(duration_seconds) AS watch_seconds,
        count(*) AS session_count
    FROM playback_sessions
    GROUP BY bucket, server_id, user_id";

/// 일별 사용자 재생 통계 (정확 집계)
const PLAYBACK_STATS_DAILY_FALLBACK: &str = "
    SELECT
        time_bucket(INTERVAL '1 day', started_at) AS bucket,
        server_id,
        user_id,
        count(DISTINCT COALESCE(reference_id, id)) AS play_count,
        sum(duration_seconds) AS watch_seconds,
        count(*) AS session_count
    FROM playback_sessions
    GROUP BY bucket, server_id, user_id";

/// 시간별 서버 재생 통계 (toolkit)
const PLAYBACK_STATS_HOURLY_PRIMARY: &str = "
    SELECT
        time_bucket(INTERVAL '1 hour', started_at) AS bucket,
        server_id,
        distinct_count(hyperloglog(4096, user_id)) AS active_users,
        distinct_count(hyperloglog(8192, COALESCE(reference_id, id))) AS play_count,
        sum(duration_seconds) AS watch_seconds
    FROM playback_sessions
    GROUP BY bucket, server_id";

/// 시간별 서버 재생 통계 (정확 집계)
const PLAYBACK_STATS_HOURLY_FALLBACK: &str = "
    SELECT
        time_bucket(INTERVAL '1 hour', started_at) AS bucket,
        server_id,
        count(DISTINCT user_id) AS active_users,
        count(DISTINCT COALESCE(reference_id, id)) AS play_count,
        sum(duration_seconds) AS watch_seconds
    FROM playback_sessions
    GROUP BY bucket, server_id";

/// 일별 항목 재생 통계 (toolkit)
const ITEM_STATS_DAILY_PRIMARY: &str = "
    SELECT
        time_bucket(INTERVAL '1 day', started_at) AS bucket,
        server_id,
        item_id,
        distinct_count(hyperloglog(4096, user_id)) AS unique_users,
        distinct_count(hyperloglog(8192, COALESCE(reference_id, id))) AS play_count,
        sum(duration_seconds) AS watch_seconds
    FROM playback_sessions
    GROUP BY bucket, server_id, item_id";

/// 일별 항목 재생 통계 (정확 집계)
const ITEM_STATS_DAILY_FALLBACK: &str = "
    SELECT
        time_bucket(INTERVAL '1 day', started_at) AS bucket,
        server_id,
        item_id,
        count(DISTINCT user_id) AS unique_users,
        count(DISTINCT COALESCE(reference_id, id)) AS play_count,
        sum(duration_seconds) AS watch_seconds
    FROM playback_sessions
    GROUP BY bucket, server_id, item_id";

/// 일별 라이브러리 활동 통계 (toolkit)
const LIBRARY_ACTIVITY_DAILY_PRIMARY: &str = "
    SELECT
        time_bucket(INTERVAL '1 day', recorded_at) AS bucket,
        server_id,
        library_id,
        count(*) AS event_count,
        distinct_count(hyperloglog(4096, item_id)) AS items_touched
    FROM library_item_events
    GROUP BY bucket, server_id, library_id";

/// 일별 라이브러리 활동 통계 (정확 집계)
const LIBRARY_ACTIVITY_DAILY_FALLBACK: &str = "
    SELECT
        time_bucket(INTERVAL '1 day', recorded_at) AS bucket,
        server_id,
        library_id,
        count(*) AS event_count,
        count(DISTINCT item_id) AS items_touched
    FROM library_item_events
    GROUP BY bucket, server_id, library_id";

/// 전체 연속 집계 정의 목록
///
/// 모두 사실 테이블만 읽는다. 파생 뷰를 읽는 집계는 설계상 금지이며
/// 테스트에서 거부된다.
pub static AGGREGATES: [AggregateDef; 4] = [
    AggregateDef {
        name: "playback_stats_daily",
        source: FactTable::PlaybackSessions,
        primary_query: PLAYBACK_STATS_DAILY_PRIMARY,
        fallback_query: PLAYBACK_STATS_DAILY_FALLBACK,
        refresh: RefreshPolicy {
            start_offset: "3 days",
            end_offset: "1 hour",
            schedule_interval: "1 hour",
        },
    },
    AggregateDef {
        name: "playback_stats_hourly",
        source: FactTable::PlaybackSessions,
        primary_query: PLAYBACK_STATS_HOURLY_PRIMARY,
        fallback_query: PLAYBACK_STATS_HOURLY_FALLBACK,
        refresh: RefreshPolicy {
            start_offset: "6 hours",
            end_offset: "30 minutes",
            schedule_interval: "30 minutes",
        },
    },
    AggregateDef {
        name: "item_stats_daily",
        source: FactTable::PlaybackSessions,
        primary_query: ITEM_STATS_DAILY_PRIMARY,
        fallback_query: ITEM_STATS_DAILY_FALLBACK,
        refresh: RefreshPolicy {
            start_offset: "3 days",
            end_offset: "1 hour",
            schedule_interval: "1 hour",
        },
    },
    AggregateDef {
        name: "library_activity_daily",
        source: FactTable::LibraryItemEvents,
        primary_query: LIBRARY_ACTIVITY_DAILY_PRIMARY,
        fallback_query: LIBRARY_ACTIVITY_DAILY_FALLBACK,
        refresh: RefreshPolicy {
            start_offset: "7 days",
            end_offset: "1 hour",
            schedule_interval: "6 hours",
        },
    },
];

/// 사용자별 누적 시청 통계
const USER_WATCH_TOTALS: &str = "
    SELECT
        server_id,
        user_id,
        sum(play_count) AS total_plays,
        sum(watch_seconds) AS total_watch_seconds,
        sum(session_count) AS total_sessions,
        max(bucket) AS last_active_day
    FROM playback_stats_daily
    GROUP BY server_id, user_id";

/// 서버별 최근 30일 활동 요약
const SERVER_ACTIVITY_SUMMARY: &str = "
    SELECT
        server_id,
        sum(play_count) AS play_count_30d,
        sum(watch_seconds) AS watch_seconds_30d,
        max(active_users) AS peak_hourly_users_30d
    FROM playback_stats_hourly
    WHERE bucket > NOW() - INTERVAL '30 days'
    GROUP BY server_id";

/// 월별 항목 인기 순위 소스
const ITEM_POPULARITY_MONTHLY: &str = "
    SELECT
        date_trunc('month', bucket) AS month,
        server_id,
        item_id,
        sum(play_count) AS play_count,
        sum(watch_seconds) AS watch_seconds,
        sum(unique_users) AS user_days
    FROM item_stats_daily
    GROUP BY month, server_id, item_id";

/// 라이브러리 성장 추이
const LIBRARY_GROWTH_DAILY: &str = "
    SELECT
        bucket,
        server_id,
        library_id,
        event_count,
        items_touched,
        sum(event_count) OVER (
            PARTITION BY server_id, library_id
            ORDER BY bucket
        ) AS events_running_total
    FROM library_activity_daily";

/// 서버 대시보드 상단 요약, 다른 파생 뷰 두 개를 읽는다
const SERVER_DASHBOARD_OVERVIEW: &str = "
    SELECT
        s.server_id,
        s.play_count_30d,
        s.watch_seconds_30d,
        s.peak_hourly_users_30d,
        count(u.user_id) AS known_users,
        COALESCE(sum(u.total_watch_seconds), 0) AS all_time_watch_seconds
    FROM server_activity_summary s
    LEFT JOIN user_watch_totals u ON u.server_id = s.server_id
    GROUP BY s.server_id, s.play_count_30d, s.watch_seconds_30d, s.peak_hourly_users_30d";

/// 파생 뷰 정의 목록
pub static DERIVED_VIEWS: [DerivedViewDef; 5] = [
    DerivedViewDef {
        name: "user_watch_totals",
        query: USER_WATCH_TOTALS,
        depends_on: &["playback_stats_daily"],
    },
    DerivedViewDef {
        name: "server_activity_summary",
        query: SERVER_ACTIVITY_SUMMARY,
        depends_on: &["playback_stats_hourly"],
    },
    DerivedViewDef {
        name: "item_popularity_monthly",
        query: ITEM_POPULARITY_MONTHLY,
        depends_on: &["item_stats_daily"],
    },
    DerivedViewDef {
        name: "library_growth_daily",
        query: LIBRARY_GROWTH_DAILY,
        depends_on: &["library_activity_daily"],
    },
    DerivedViewDef {
        name: "server_dashboard_overview",
        query: SERVER_DASHBOARD_OVERVIEW,
        depends_on: &["server_activity_summary", "user_watch_totals"],
    },
];

/// 특정 사실 테이블을 읽는 집계 정의 목록
pub fn aggregates_for(table: FactTable) -> Vec<&'static AggregateDef> {
    AGGREGATES.iter().filter(|d| d.source == table).collect()
}

/// 주어진 집계 집합으로 생성 가능한 파생 뷰를 의존 순서로 반환
///
/// 상위가 하나라도 빠진 뷰는 제외된다. 뷰가 뷰를 읽는 경우 앞서
/// 포함된 뷰만 상위로 인정되므로 결과는 항상 위상 순서다.
pub fn derived_views_for(available_aggregates: &HashSet<&str>) -> Vec<&'static DerivedViewDef> {
    let mut satisfied: HashSet<&str> = available_aggregates.clone();
    let mut ordered: Vec<&'static DerivedViewDef> = Vec::new();

    loop {
        let mut added = false;
        for view in DERIVED_VIEWS.iter() {
            if ordered.iter().any(|v| v.name == view.name) {
                continue;
            }
            if view.depends_on.iter().all(|dep| satisfied.contains(dep)) {
                satisfied.insert(view.name);
                ordered.push(view);
                added = true;
            }
        }
        if !added {
            break;
        }
    }

    ordered
}

/// 모든 집계가 존재할 때의 파생 뷰 생성 순서
pub fn derived_views_in_order() -> Vec<&'static DerivedViewDef> {
    let all: HashSet<&str> = AGGREGATES.iter().map(|d| d.name).collect();
    derived_views_for(&all)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// SELECT 목록에서 AS 별칭만 뽑아낸다
    fn extract_aliases(query: &str) -> Vec<String> {
        query
            .lines()
            .filter_map(|line| {
                let line = line.trim().trim_end_matches(',');
                line.rfind(" AS ")
                    .map(|idx| line[idx + 4..].trim().to_string())
            })
            .collect()
    }

    fn group_by_clause(query: &str) -> Option<String> {
        query
            .lines()
            .find(|line| line.trim_start().starts_with("GROUP BY"))
            .map(|line| line.trim().to_string())
    }

    #[test]
    fn registry_version_is_positive() {
        assert!(AGGREGATE_REGISTRY_VERSION > 0);
    }

    #[test]
    fn aggregate_and_view_names_are_unique() {
        let mut names = HashSet::new();
        for def in AGGREGATES.iter() {
            assert!(names.insert(def.name), "집계 이름 중복: {}", def.name);
        }
        for view in DERIVED_VIEWS.iter() {
            assert!(names.insert(view.name), "뷰 이름 중복: {}", view.name);
        }
    }

    #[test]
    fn view_dependencies_resolve() {
        let known: HashSet<&str> = AGGREGATES
            .iter()
            .map(|d| d.name)
            .chain(DERIVED_VIEWS.iter().map(|v| v.name))
            .collect();
        for view in DERIVED_VIEWS.iter() {
            for dep in view.depends_on {
                assert!(known.contains(dep), "{} 의 상위 {} 미정의", view.name, dep);
            }
        }
    }

    #[test]
    fn no_aggregate_reads_a_derived_view() {
        for def in AGGREGATES.iter() {
            for view in DERIVED_VIEWS.iter() {
                assert!(
                    !def.primary_query.contains(view.name)
                        && !def.fallback_query.contains(view.name),
                    "{} 집계가 파생 뷰 {} 를 읽음",
                    def.name,
                    view.name
                );
            }
        }
    }

    #[test]
    fn all_views_build_when_all_aggregates_exist() {
        let ordered = derived_views_in_order();
        assert_eq!(ordered.len(), DERIVED_VIEWS.len());
    }

    #[test]
    fn view_order_is_topological() {
        let aggregate_names: HashSet<&str> = AGGREGATES.iter().map(|d| d.name).collect();
        let ordered = derived_views_in_order();
        for (idx, view) in ordered.iter().enumerate() {
            for dep in view.depends_on {
                let dep_is_earlier_view =
                    ordered[..idx].iter().any(|v| v.name == *dep);
                assert!(
                    aggregate_names.contains(dep) || dep_is_earlier_view,
                    "{} 가 상위 {} 보다 먼저 생성됨",
                    view.name,
                    dep
                );
            }
        }
    }

    #[test]
    fn missing_secondary_aggregate_excludes_dependent_views() {
        let primary_only: HashSet<&str> = AGGREGATES
            .iter()
            .filter(|d| d.source == FactTable::PlaybackSessions)
            .map(|d| d.name)
            .collect();
        let views = derived_views_for(&primary_only);
        assert!(views.iter().all(|v| v.name != "library_growth_daily"));
        assert!(views.iter().any(|v| v.name == "server_dashboard_overview"));
    }

    #[test]
    fn primary_and_fallback_share_output_shape() {
        for def in AGGREGATES.iter() {
            assert_eq!(
                extract_aliases(def.primary_query),
                extract_aliases(def.fallback_query),
                "{} 의 두 쿼리 별칭 불일치",
                def.name
            );
            assert_eq!(
                group_by_clause(def.primary_query),
                group_by_clause(def.fallback_query),
                "{} 의 두 쿼리 GROUP BY 불일치",
                def.name
            );
            assert!(def.primary_query.contains("hyperloglog"));
            assert!(def.fallback_query.contains("count(DISTINCT"));
            assert!(!def.fallback_query.contains("hyperloglog"));
        }
    }

    #[test]
    fn aggregates_read_their_declared_source() {
        for def in AGGREGATES.iter() {
            let from = format!("FROM {}", def.source.table_name());
            assert!(def.primary_query.contains(&from));
            assert!(def.fallback_query.contains(&from));
        }
    }

    #[test]
    fn definitions_compare_by_content() {
        let a = AGGREGATES[0];
        let mut b = a;
        assert_eq!(a, b);
        b.refresh.schedule_interval = "2 hours";
        assert_ne!(a, b);
    }
}
