pub mod config;
pub mod error;

pub use config::StrongboxConfig;
pub use error::{StrongboxError, StrongboxResult};
