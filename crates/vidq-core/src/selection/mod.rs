//! Pending quality menus, one per user.
//!
//! A reference is opened, resolved into variants, and then either selected
//! (producing a [`Job`](crate::pipeline::Job)) or expired by its timer.

mod store;

pub use store::{EntryTicket, SelectionStore, CANCELLED_TEXT};
