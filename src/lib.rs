pub mod analyzers;
pub mod config;
pub mod error;
pub mod grid;
pub mod output;
pub mod parser;
pub mod report;
pub mod source;
