pub mod cli;
pub mod config;
pub mod contract;
pub mod cycle;
pub mod error;
pub mod fetch;
pub mod load_config;
pub mod publish;
pub mod report;
pub mod select;
pub mod sources;
pub mod state;
