//! Nutrition-tracking chat assistant.
//!
//! Free-text messages are answered by a language model that can call
//! `generate_log_entry` to turn a meal description into calorie, macro and
//! micronutrient estimates.

pub mod app;
pub mod config;
pub mod error;
pub mod llm;
pub mod nutrition;
pub mod state;
