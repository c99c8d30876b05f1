//! rota-sdk: chat platform access for the duty rotation bot.
//!
//! - `gateway`: the [`Gateway`] contract the rotation logic talks to
//! - `slack`: Slack Web API implementation of that contract
//! - `events`: Slack Events API payloads received over HTTP
//! - `signing`: Slack request signature verification
//! - `memory`: in-memory gateway for tests (`testing` feature)

pub mod error;
pub mod events;
pub mod gateway;
#[cfg(any(test, feature = "testing"))]
pub mod memory;
pub mod signing;
pub mod slack;

pub use error::{Error, Result};
pub use gateway::{Gateway, MessageRef, Reaction, UserId, UserProfile};
pub use slack::{RetryPolicy, SlackClient, SlackConfig};
