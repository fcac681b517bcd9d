pub mod playback_sessions;
pub mod playback_events;
pub mod library_item_events;
