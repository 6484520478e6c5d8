//! Request edge: HTTP handlers and cross-cutting middleware
//!
//! Every endpoint validates its inputs, dispatches exactly one component
//! call, and shapes the response. Error mapping lives in `crate::error`;
//! nothing below the edge knows about status codes.

pub mod catalog;
pub mod feedback;
pub mod health;
pub mod keys;
pub mod middleware;
pub mod models;
pub mod workflow;
