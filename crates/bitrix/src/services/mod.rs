//! Application-facing operations over the registered repositories.

pub mod contact;
pub mod deal;

pub use contact::{ContactSearch, ContactService};
pub use deal::{DealListOptions, DealService};
