//! Presentation order: sorting, grouping and filtering

mod compare;
mod engine;
mod filter;
mod groups;

pub use compare::Comparator;
pub use engine::{Placement, ViewEngine};
pub use filter::WildcardFilter;
pub use groups::{group_key_at, Group, GroupKey, GroupTable, UNSPECIFIED};
