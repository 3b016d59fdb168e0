pub mod time;

pub use time::{format_minutes, truncate_to_minute};
