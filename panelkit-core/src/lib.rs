pub mod config;
pub mod model;
pub mod reducer;
pub mod state;

// Shared list machinery
pub mod filter;
pub mod local_index;
pub mod resolve;
pub mod sort;

// Host bridge: slices, actions and the event bus
pub mod actions;
pub mod event;
pub mod slice;

// Typed commands and agent-facing tools
pub mod command;
pub mod tool;

// Mounting panels
pub mod lifecycle;
pub mod runtime;
pub mod view;

pub mod panels;

#[cfg(test)]
mod test_support;
