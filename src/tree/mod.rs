//! The grouping tree itself: node universe, total sibling order, change
//! paths, event-driven recomputation, and leaf navigation.

pub mod compare;
pub mod navigate;
pub mod node;
pub mod path;
pub mod process;
