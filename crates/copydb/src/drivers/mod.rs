//! Database driver adapters.
//!
//! Adapters implement the core session and snapshot traits for concrete
//! engines. Connection establishment, credential handling, and transport
//! security live here, outside the engine itself.

pub mod postgres;

pub use postgres::PgDriver;
