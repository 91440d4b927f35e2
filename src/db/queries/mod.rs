//! Database queries

pub mod brand;
pub mod label;
pub mod lead;
