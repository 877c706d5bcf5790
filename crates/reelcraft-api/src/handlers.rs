//! Request handlers.

pub mod clips;
pub mod embeddings;
pub mod health;
pub mod reels;

pub use clips::*;
pub use embeddings::*;
pub use health::*;
pub use reels::*;
