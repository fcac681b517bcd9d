use std::io::Write;

use chrono::Local;
use env_logger::Builder;
use log::{LevelFilter, debug, info};

use umss_stats_analytics::converge;
use umss_stats_config::Settings;
use umss_stats_db::{initialize_db, initialize_dbpool};
use umss_stats_error::Result;

/// 로거 세팅
fn setup_logger() {
    #[cfg(debug_assertions)]
    {
        Builder::new()
            .filter(None, LevelFilter::Debug)
            .format(|buf, record| {
                writeln!(
                    buf,
                    "[{} {} {}:{}] {}",
                    Local::now().format("%Y-%m-%d %H:%M:%S"),
                    record.level(),
                    record.file().unwrap_or("unknown"),
                    record.line().unwrap_or(0),
                    record.args()
                )
            })
            .init()
    }

    #[cfg(not(debug_assertions))]
    {
        Builder::new().filter(None, LevelFilter::Info).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // 로거 세팅
    setup_logger();

    info!("ustats 재생 통계 서비스 시작");

    // 통합 설정 로드
    let settings = Settings::new()?;

    // db 세팅
    let db_pool = initialize_dbpool(&settings.database).await?;

    let pool_status = db_pool.pool_status();
    debug!(
        "연결 풀 상태: size={}, available={}, waiting={}",
        pool_status.size, pool_status.available, pool_status.waiting
    );

    // 기본 스키마 확인
    initialize_db(&db_pool).await?;

    // 분석 스키마 수렴
    if settings.service.converge_on_start {
        let report = converge(&db_pool).await;

        if settings.service.verbose_actions {
            for action in &report.actions {
                info!("수렴 작업: {action}");
            }
        }

        info!(
            "분석 수렴 종료: success={}, 집계 {}개, 청크 {}개",
            report.success,
            report.status.existing_aggregates.len(),
            report.status.chunk_count
        );
    }

    Ok(())
}
