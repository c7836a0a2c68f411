//! cita-bot - a Telegram bot that watches an appointment-booking page for free slots.
//!
//! The bot periodically drives a headless browser through the booking widget's
//! alert/continue flow, classifies the rendered page text, and notifies
//! subscribed chats when availability appears. Monitoring state survives
//! restarts through a small SQLite database.

pub mod bot;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod logging;
pub mod model;
pub mod monitor;
pub mod probe;
pub mod repository;
pub mod service;
