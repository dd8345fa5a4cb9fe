pub mod config;
pub mod package;
pub mod scan;
pub mod version;
