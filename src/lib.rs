pub mod action;
pub mod backend;
pub mod config;
pub mod errors;
pub mod event;
pub mod geometry;
mod handlers;
pub mod input;
pub mod layout;
pub mod output;
pub mod root;
pub mod seat;
pub mod state;
pub mod status;
pub mod toolkit;
pub mod transaction;
pub mod view;
pub mod view_stack;

#[cfg(test)]
mod tests;

pub use errors::{CompositorError, Result};
pub use root::Root;
pub use state::Estuary;
