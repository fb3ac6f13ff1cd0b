pub mod defs;
pub mod schedule;

pub use defs::*;
pub use schedule::{category_set, due_subscribers, EmailFrequency};
