#[derive(Debug, thiserror::Error)]
pub enum IkamonError {
    #[error("invalid target '{target}': {detail}")]
    InvalidTarget { target: String, detail: String },
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("cannot decode payload: {0}")]
    Decode(String),
    #[error("geo lookup failed: {0}")]
    Lookup(String),
    #[error("monitor unreachable: {0}")]
    Unreachable(String),
    #[error("serialization error: {0}")]
    Serialization(#[source] std::io::Error),
    #[error("TUI error: {0}")]
    Tui(#[source] std::io::Error),
    #[error("fatal: {0}")]
    Fatal(String),
}
