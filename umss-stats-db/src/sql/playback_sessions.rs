/// 테이블 생성 쿼리
///
/// 기본키는 id 단독으로 생성한다. 하이퍼테이블 전환 시
/// (id, started_at) 복합키로 교체된다.
pub const CREATE_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS playback_sessions (
        id BIGSERIAL PRIMARY KEY,
        server_id INTEGER NOT NULL,
        user_id TEXT NOT NULL,
        item_id TEXT NOT NULL,
        library_id TEXT,
        reference_id BIGINT,
        started_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        ended_at TIMESTAMPTZ,
        duration_seconds INTEGER NOT NULL DEFAULT 0,
        play_method TEXT,
        client_name TEXT,
        device_id TEXT,
        is_completed BOOLEAN NOT NULL DEFAULT FALSE
    )";

/// 기본 인덱스 생성 쿼리
pub const CREATE_INDICES: [&str; 4] = [
    "CREATE INDEX IF NOT EXISTS playback_sessions_server_id_idx ON playback_sessions(server_id)",
    "CREATE INDEX IF NOT EXISTS playback_sessions_user_id_idx ON playback_sessions(user_id)",
    "CREATE INDEX IF NOT EXISTS playback_sessions_item_id_idx ON playback_sessions(item_id)",
    "CREATE INDEX IF NOT EXISTS playback_sessions_started_at_idx ON playback_sessions(started_at)",
];
