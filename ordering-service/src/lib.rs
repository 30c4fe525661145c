//! ordering-service: order and quote lifecycle engine for barrel commerce.
//!
//! Owns monetary calculation, barrel stock reservation, and the order and
//! quote state machines. Transport layers sit on top of [`services::OrderService`]
//! and [`services::QuoteService`].

pub mod models;
pub mod services;
