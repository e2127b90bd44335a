pub mod overview;
pub mod peers;

use crate::model::Scope;

/// The two peer tables; the focused one receives scroll keys.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum Pane {
    #[default]
    Local,
    Remote,
}

impl Pane {
    /// Human-readable title for the table block.
    pub fn title(&self) -> &str {
        match self {
            Self::Local => "Source",
            Self::Remote => "Destination",
        }
    }

    pub fn scope(&self) -> Scope {
        match self {
            Self::Local => Scope::Local,
            Self::Remote => Scope::Remote,
        }
    }

    /// Zero-based index (left to right).
    pub fn index(&self) -> usize {
        match self {
            Self::Local => 0,
            Self::Remote => 1,
        }
    }

    /// Switch focus to the other table.
    pub fn next(&self) -> Self {
        match self {
            Self::Local => Self::Remote,
            Self::Remote => Self::Local,
        }
    }
}
