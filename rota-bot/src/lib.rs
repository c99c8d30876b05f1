//! rota-bot: weekly cleaning-duty rotation for a Slack channel.
//!
//! Two groups of members take turns. Each cycle the bot checks who reacted
//! to last week's announcement, reports the stragglers (or celebrates the
//! streak), hands this week's group a shuffled set of locations, posts the
//! result and persists the new rotation state.

pub mod announce;
pub mod config;
pub mod groups;
pub mod locations;
pub mod reconcile;
pub mod roster;
pub mod rotation;
pub mod scheduler;
pub mod store;
pub mod timer;
pub mod web;
