pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod traits;
