//! Service Layer
//!
//! Business logic between the HTTP handlers and the store.

mod deposition;
mod users;

pub use deposition::*;
pub use users::*;
