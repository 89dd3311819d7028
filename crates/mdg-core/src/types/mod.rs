//! Core data types shared by the feed supervisor and the request router.

pub mod enums;
pub mod market_data;
pub mod subscription;

pub use enums::*;
pub use market_data::*;
pub use subscription::*;
