//! rTimeTrace library root.
//! Flat-file store for time records: text codec, date-partitioned path
//! index, and a concurrent, cancelable query engine on top of it.

pub mod codec;
pub mod config;
pub mod errors;
pub mod filter;
pub mod models;
pub mod store;
pub mod utils;

pub use config::Config;
pub use errors::{AppError, AppResult};
pub use filter::Filter;
pub use models::{Pause, Record};
pub use store::{CancelToken, RecordStore, RecordStream, ScanState};
