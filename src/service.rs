//! Business logic services for subscription management.

pub mod error;
pub mod subscription_service;
