pub mod broadcast;
pub mod client;
pub mod routes;
pub mod server;

pub use broadcast::Broadcaster;
pub use client::{Client, ClientRegistry};
pub use server::{start, AppState, ServerConfig, ServerHandle};
