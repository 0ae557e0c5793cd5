//! Ledger Intake
//!
//! A conversational assistant backend that turns free-form chat messages
//! into structured records:
//! - Financial transactions (expenses, income, installment purchases)
//! - Memory notes (notes, ideas, reflections, dated reminders)
//!
//! Every extracted record waits for an explicit confirm or cancel before it
//! is persisted. Committed records are mirrored into a secondary system on a
//! best-effort basis, and a reconciler can replay that mirror at any time.
//!
//! FLOW:
//! MESSAGE → CLASSIFY → EXTRACT → NORMALIZE → PENDING → CONFIRM → PERSIST → MIRROR

pub mod api;
pub mod app;
pub mod classifier;
pub mod config;
pub mod confirmation;
pub mod error;
pub mod extraction;
pub mod gemini;
pub mod installments;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod reconciler;
pub mod repository;
pub mod session;
pub mod sync;

#[cfg(test)]
mod test_support;

pub use error::{AssistantError, Result};

// Re-export common types
pub use app::Assistant;
pub use config::AppConfig;
pub use models::*;
