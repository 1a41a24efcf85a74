// Command handlers module
pub mod monitor;
