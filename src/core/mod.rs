//! Core algorithms – creator trees, action tagging, and binding.
//!
//! Nothing in this module does I/O.  Trees and bound actions are
//! `Send + Sync` so they can be shared across threads.

pub mod action;
pub mod binder;
pub mod tree;
