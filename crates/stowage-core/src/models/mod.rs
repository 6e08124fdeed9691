//! Data models for the upload protocol
//!
//! The asset identity record and its category live in `asset`/`category`,
//! the value object external entities persist in `asset_reference`, and the
//! HTTP request/response shapes in `upload`.

mod asset;
mod asset_reference;
mod category;
mod upload;

pub use asset::*;
pub use asset_reference::*;
pub use category::*;
pub use upload::*;
