pub mod config;
pub mod error;
pub mod source;
pub mod types;

pub use config::CycleScanConfig;
pub use error::CoreError;
pub use source::SnapshotSource;
pub use types::*;
