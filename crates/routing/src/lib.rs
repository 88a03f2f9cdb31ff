//! Keyword intent classification for inbound customer messages.
//!
//! A fixed rule table, evaluated in priority order:
//! 1. Product inquiry (price questions)
//! 2. Order
//! 3. Order status
//! 4. Promo inquiry
//! 5. Location
//! 6. Business hours
//! 7. General (no rule matched)

pub mod error;
pub mod intent;

pub use {
    error::{Error, Result},
    intent::{Intent, RULES, classify},
};
