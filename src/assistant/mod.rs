//! The bridge between the conversational assistant and the ledger.
//!
//! The natural-language model itself runs outside this service. What it gets
//! from here is a snapshot of the caller's finances to ground its replies,
//! and a single structured action endpoint to act through. The bridge holds
//! no special powers: every action goes through the same ledger operations as
//! the direct API, with the same ownership and validation checks.

mod core;
mod endpoints;

pub(crate) use core::{AssistantAction, perform_action};
pub(crate) use endpoints::{assistant_action_endpoint, assistant_context_endpoint};
