pub mod pause;
pub mod record;
pub mod tags;

pub use pause::Pause;
pub use record::Record;
pub use tags::{Tags, parse_tags};
