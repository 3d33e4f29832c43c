pub mod link;
pub mod names;
pub mod session;

pub use link::{Link, LinkId, NewLink, TypeId};
pub use session::Session;
