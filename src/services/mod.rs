//! Business logic services

pub mod export;
pub mod import;
pub mod import_processor;
pub mod lead_store;
pub mod template;
pub mod xlsx_style;
