#[path = "builder/client_builder.rs"]
mod client_builder;

#[path = "builder/resilience.rs"]
mod resilience;

#[path = "builder/state.rs"]
mod state;

pub use client_builder::ClientBuilder;
