//! Shared helpers.

pub mod category;
pub mod date;
pub mod slug;
