pub mod filter;

pub use filter::{LinkFilter, TreeFilter};
