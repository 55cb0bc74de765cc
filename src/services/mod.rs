//! Business logic services
//!
//! The resolvers (`parameters`, `associations`, `classes`) and the clone
//! engine are free functions over a [`HostgroupTree`] snapshot.
//! [`HostgroupService`] owns that snapshot and runs every mutation through
//! the guard and the database.

pub mod associations;
pub mod classes;
pub mod clone;
pub mod guard;
pub mod hostgroup;
pub mod parameters;
pub mod search;
pub mod tree;

pub use hostgroup::{HostgroupService, Inventory};
pub use search::SearchQuery;
pub use tree::HostgroupTree;
