pub mod cli;
pub mod conf;
pub mod serde_level;
