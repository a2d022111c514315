pub mod snapshot;
pub mod table;
