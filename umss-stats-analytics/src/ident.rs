use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use umss_stats_error::{Result, StatsError};

/// 식별자 허용 패턴, PostgreSQL 기본 식별자 길이 제한 포함
static IDENT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}$").expect("식별자 패턴 컴파일 실패")
});

/// 카탈로그에서 조회한 식별자의 안전 래퍼
///
/// 제약조건 이름처럼 런타임에 발견한 식별자를 SQL 문자열에 삽입하기 전에
/// 생성 시점에 검증한다. 검증 없이 만들 방법은 없다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafeIdent(String);

impl SafeIdent {
    /// 검증 후 생성, 허용 패턴 밖이면 에러
    pub fn new(raw: &str) -> Result<Self> {
        if IDENT_PATTERN.is_match(raw) {
            Ok(Self(raw.to_string()))
        } else {
            Err(StatsError::Analytics(format!(
                "허용되지 않는 식별자: {raw:?}"
            )))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SafeIdent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ordinary_identifiers() {
        for raw in [
            "playback_sessions_pkey",
            "playback_events_session_id_fkey",
            "_hidden",
            "a",
            "Constraint1",
        ] {
            assert!(SafeIdent::new(raw).is_ok(), "{raw} 거부됨");
        }
    }

    #[test]
    fn rejects_injection_shaped_input() {
        for raw in [
            "",
            "1starts_with_digit",
            "name; DROP TABLE playback_sessions",
            "name\"",
            "name'",
            "name with space",
            "name-dash",
        ] {
            assert!(SafeIdent::new(raw).is_err(), "{raw:?} 허용됨");
        }
    }

    #[test]
    fn rejects_over_length_identifiers() {
        let long = "a".repeat(64);
        assert!(SafeIdent::new(&long).is_err());
        let max = "a".repeat(63);
        assert!(SafeIdent::new(&max).is_ok());
    }

    #[test]
    fn displays_verbatim() {
        let ident = SafeIdent::new("playback_sessions_pkey").unwrap();
        assert_eq!(format!("{ident}"), "playback_sessions_pkey");
        assert_eq!(ident.as_str(), "playback_sessions_pkey");
    }
}
