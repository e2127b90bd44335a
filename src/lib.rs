pub mod cli;
pub mod enrichment;
pub mod error;
pub mod model;
pub mod output;
pub mod poller;
pub mod source;
pub mod state;
pub mod tui;
