use std::collections::HashSet;

use deadpool_postgres::Object;
use log::info;

use umss_stats_error::Result;

use crate::materialize;
use crate::meta;
use crate::registry::{self, AGGREGATE_REGISTRY_VERSION, AggregateDef};

/// 재구축 진행 콜백, (현재 단계, 전체 단계 수, 메시지)
///
/// 관측용이며 상태 기계 진행에는 영향을 주지 않는다.
pub type ProgressFn = dyn Fn(usize, usize, &str) + Send + Sync;

/// 재구축 결과
#[derive(Debug, Clone)]
pub struct RebuildOutcome {
    pub success: bool,
    pub message: String,
}

/// 재구축 단계 이름, 실행 순서 고정
pub(crate) const REBUILD_STEPS: [&str; 6] = [
    "기존 집계 전체 삭제",
    "집계 재생성",
    "리프레시 정책 설치",
    "파생 뷰 재생성",
    "전체 범위 백필",
    "레지스트리 버전 기록",
];

/// 전체 재구축 필요 여부
///
/// 저장 버전 0 은 신규 설치로 보고 값싼 생성 경로를 탄다. 잃을 것이
/// 없는 신규 설치에 삭제/재생성을 돌릴 이유가 없다.
pub fn needs_full_rebuild(stored: i64, current: i64) -> bool {
    stored > 0 && stored != current
}

/// 단계 완료 통지
fn notify(progress: Option<&ProgressFn>, step: usize, message: &str) {
    info!(
        "재구축 {}/{} 단계 완료: {}",
        step,
        REBUILD_STEPS.len(),
        message
    );
    if let Some(callback) = progress {
        callback(step, REBUILD_STEPS.len(), message);
    }
}

/// 집계 전체를 삭제 후 재생성하는 전체 재구축
///
/// 선형 상태 기계다. 삭제 → 재생성 → 정책 → 파생 뷰(의존 순서) →
/// 백필 → 버전 기록. 단계 하나라도 실패하면 즉시 중단하고 에러를
/// 올린다. 버전 기록이 마지막이므로 실패한 재구축은 다음 기동에서
/// 처음부터 다시 시도된다.
pub async fn rebuild_all(
    conn: &Object,
    defs: &[&'static AggregateDef],
    use_toolkit: bool,
    progress: Option<&ProgressFn>,
) -> Result<()> {
    // 삭제, CASCADE 로 파생 뷰도 함께 떨어진다
    for def in defs {
        materialize::drop_aggregate(conn, def.name).await?;
    }
    notify(progress, 1, REBUILD_STEPS[0]);

    // 재생성, toolkit 유무는 호출자가 조사해 넘긴다
    for def in defs {
        materialize::create_aggregate(conn, def, use_toolkit).await?;
    }
    notify(progress, 2, REBUILD_STEPS[1]);

    for def in defs {
        materialize::install_refresh_policy(conn, def).await?;
    }
    notify(progress, 3, REBUILD_STEPS[2]);

    // 파생 뷰는 상위가 먼저 생성되는 순서로만 만든다
    let available: HashSet<&str> = defs.iter().map(|d| d.name).collect();
    for view in registry::derived_views_for(&available) {
        materialize::create_derived_view(conn, view).await?;
    }
    notify(progress, 4, REBUILD_STEPS[3]);

    // 백필, 다음 스케줄 창을 기다리지 않고 바로 채운다
    for def in defs {
        materialize::refresh_full_range(conn, def.name).await?;
    }
    notify(progress, 5, REBUILD_STEPS[4]);

    meta::store_registry_version(conn, AGGREGATE_REGISTRY_VERSION).await?;
    notify(progress, 6, REBUILD_STEPS[5]);

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[test]
    fn rebuild_decision_table() {
        // 신규 설치는 값싼 경로
        assert!(!needs_full_rebuild(0, 3));
        // 버전 일치는 재구축 불필요
        assert!(!needs_full_rebuild(3, 3));
        // 버전 차이는 재구축
        assert!(needs_full_rebuild(2, 3));
        // 다운그레이드도 정의가 다르므로 재구축
        assert!(needs_full_rebuild(4, 3));
    }

    #[test]
    fn current_version_never_triggers_rebuild() {
        assert!(!needs_full_rebuild(
            AGGREGATE_REGISTRY_VERSION,
            AGGREGATE_REGISTRY_VERSION
        ));
    }

    #[test]
    fn progress_callback_reports_step_and_total() {
        let seen: Arc<Mutex<Vec<(usize, usize, String)>>> = Arc::new(Mutex::new(Vec::new()));
        let seen_for_callback = Arc::clone(&seen);
        let callback = move |step: usize, total: usize, message: &str| {
            seen_for_callback
                .lock()
                .unwrap()
                .push((step, total, message.to_string()));
        };

        for (idx, step_name) in REBUILD_STEPS.iter().enumerate() {
            notify(Some(&callback), idx + 1, step_name);
        }

        drop(callback);
        let seen = Arc::try_unwrap(seen).unwrap().into_inner().unwrap();
        assert_eq!(seen.len(), REBUILD_STEPS.len());
        for (idx, (step, total, message)) in seen.iter().enumerate() {
            assert_eq!(*step, idx + 1);
            assert_eq!(*total, REBUILD_STEPS.len());
            assert_eq!(message, REBUILD_STEPS[idx]);
        }
    }

    #[test]
    fn version_write_is_the_final_step() {
        assert_eq!(REBUILD_STEPS[REBUILD_STEPS.len() - 1], "레지스트리 버전 기록");
    }
}
