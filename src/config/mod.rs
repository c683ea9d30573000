//! Configuration management for Quarry

pub mod compilation;
pub mod config;
pub mod scripts;


// Re-export main types for convenience
pub use compilation::CompilerConfig;
pub use config::Config;
pub use scripts::ScriptsConfig;
