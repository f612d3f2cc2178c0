//! SPENDWATCH Core - Entity Types
//!
//! Pure data structures shared by every other crate: profiles, records,
//! enums, errors, configuration and health types. No I/O lives here.

mod config;
mod entities;
mod enums;
mod error;
mod health;
mod identity;

pub use config::*;
pub use entities::*;
pub use enums::*;
pub use error::*;
pub use health::*;
pub use identity::*;
