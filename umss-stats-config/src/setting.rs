use std::path::Path;

use log::info;

use umss_stats_error::{Result, StatsError};

use crate::config::Config;
use crate::dbconfig::DbConfig;

/// 통합 세팅 인스턴스
pub struct Settings {
    pub service: Config,
    pub database: DbConfig,
}

impl Settings {
    /// Setting 생성
    pub fn new() -> Result<Self> {
        let service = Self::load_service_config()?;
        let database = Self::load_db_config()?;

        Ok(Self {
            service,
            database,
        })
    }

    /// 서비스 설정 로드, 파일이 없으면 기본설정
    fn load_service_config() -> Result<Config> {
        if Path::new("config.yml").exists() {
            info!("서비스 설정파일 로드: config.yml");
            Config::from_file("config.yml")
                .map_err(|e| StatsError::Config(format!("서비스 설정파일 로드 실패: {e}")))
        } else {
            info!("서비스 기본설정 사용");
            Ok(Config::new())
        }
    }

    /// db 설정 로드, 파일이 없으면 기본설정
    fn load_db_config() -> Result<DbConfig> {
        if Path::new("db.yml").exists() {
            info!("DB 설정파일 로드: db.yml");
            DbConfig::from_file("db.yml")
                .map_err(|e| StatsError::Config(format!("DB 설정파일 로드 실패: {e}")))
        } else {
            info!("DB 기본설정 사용");
            Ok(DbConfig::default())
        }
    }
}
