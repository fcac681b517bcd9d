use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use umss_stats_error::Result;

/// 통계 서비스 설정
///
/// 구조적 간격(청크 폭, 압축 유예, 보존 기간, 리프레시 정책)은 설정이
/// 아니라 소스에 고정된다. 여기는 동작 토글만 둔다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 시작시 분석 스키마 수렴 실행 여부
    pub converge_on_start: bool,
    /// 수렴 작업 로그를 개별 출력할지 여부
    pub verbose_actions: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    /// 기본설정으로 생성
    #[must_use]
    pub fn new() -> Self {
        Self {
            converge_on_start: true,
            verbose_actions: true,
        }
    }

    /// 설정파일에서 설정 로드, 빠진 항목은 기본값
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config = serde_yml::from_str(&contents)?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converges_on_start_by_default() {
        let config = Config::new();
        assert!(config.converge_on_start);
        assert!(config.verbose_actions);
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let config: Config = serde_yml::from_str("converge_on_start: false\n").unwrap();
        assert!(!config.converge_on_start);
        assert!(config.verbose_actions);
    }
}
