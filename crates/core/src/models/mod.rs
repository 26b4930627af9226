//! Data models for Enrol

mod enrollment;
mod member;
mod section;
mod tenant;

pub use enrollment::*;
pub use member::*;
pub use section::*;
pub use tenant::*;
