pub mod consensus;
pub mod lease_store;
pub mod repository;

pub use consensus::*;
pub use lease_store::*;
pub use repository::*;
