pub mod pool;
pub mod db;
pub mod sql;

pub use pool::{
    DatabasePool,
    PoolStatus,
    initialize_dbpool,
};

pub use db::{
    initialize_db,
};

pub use sql::{
    playback_sessions,
    playback_events,
    library_item_events,
};
