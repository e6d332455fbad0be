//! Client for the remote user API.

mod api_types;
mod client;

pub use client::{RemoteClient, RemoteSource};
