/// 테이블 생성 쿼리
pub const CREATE_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS library_item_events (
        id BIGSERIAL,
        server_id INTEGER NOT NULL,
        library_id TEXT NOT NULL,
        item_id TEXT NOT NULL,
        event_type TEXT NOT NULL,
        recorded_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        metadata_ready BOOLEAN NOT NULL DEFAULT FALSE,
        PRIMARY KEY (id, recorded_at)
    )";

/// 기본 인덱스 생성 쿼리
pub const CREATE_INDICES: [&str; 2] = [
    "CREATE INDEX IF NOT EXISTS library_item_events_server_library_idx ON library_item_events(server_id, library_id)",
    "CREATE INDEX IF NOT EXISTS library_item_events_recorded_at_idx ON library_item_events(recorded_at)",
];
