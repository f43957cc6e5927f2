//! Adapters for the ticket gateway.
//!
//! Infrastructure implementations of the outbound ports and HTTP error
//! conversions.

pub mod discord;
mod error_conversions;
pub mod firestore;
pub mod memory;

pub use discord::DiscordClient;
pub use firestore::FirestoreClient;
pub use memory::{Fault, InMemoryChatPlatform, InMemoryPolicyStore, SentMessage};
