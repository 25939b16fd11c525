//! Domain models

pub mod asset;
pub mod asset_group;
pub mod credential;
pub mod pagination;
pub mod session;

pub use asset::*;
pub use asset_group::*;
pub use credential::*;
pub use pagination::*;
pub use session::*;
