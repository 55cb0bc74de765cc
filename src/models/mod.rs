//! Data models

mod context;
mod hostgroup;
mod lookup_value;
mod registry;
mod settings;
mod views;

pub use context::*;
pub use hostgroup::*;
pub use lookup_value::*;
pub use registry::*;
pub use settings::*;
pub use views::*;
