//! BDD step definitions for the SmartQueue client

pub mod customer_steps;
pub mod view_steps;
