pub mod error;
pub mod provider;
pub mod sanitize;
pub mod yahoo;
