pub mod rate;
pub mod target_bar;

pub use rate::{format_size, format_uptime, scale_size, size_unit, target_port};
pub use target_bar::{TargetAction, TargetBar};
