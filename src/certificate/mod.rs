//! Certificate definitions and the HTTP surface around them.

pub mod handlers;
pub mod models;
