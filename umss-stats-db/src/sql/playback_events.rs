/// 테이블 생성 쿼리
///
/// session_id 외래키는 playback_sessions 하이퍼테이블 전환 시 제거되고
/// 인덱스 기반 애플리케이션 관계로 대체된다.
pub const CREATE_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS playback_events (
        id BIGSERIAL PRIMARY KEY,
        session_id BIGINT NOT NULL REFERENCES playback_sessions(id) ON DELETE CASCADE,
        event_type TEXT NOT NULL,
        position_seconds INTEGER NOT NULL DEFAULT 0,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )";

/// 기본 인덱스 생성 쿼리
pub const CREATE_INDICES: [&str; 2] = [
    "CREATE INDEX IF NOT EXISTS playback_events_created_at_idx ON playback_events(created_at)",
    "CREATE INDEX IF NOT EXISTS playback_events_event_type_idx ON playback_events(event_type)",
];
