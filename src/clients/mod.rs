// Market data feeds

pub mod replay;

pub use replay::{load_bars, parse_bars, spawn_replay, to_events, RecordedBar};
