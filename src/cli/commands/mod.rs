//! CLI command modules

pub mod check;
pub mod compile;
pub mod complete;
pub mod delete;
pub mod export;
pub mod import;
pub mod init;
pub mod list;
pub mod new;
pub mod run;
pub mod template;
