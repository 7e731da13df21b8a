pub mod pool;

pub use pool::{DbPool, connect_to_db, run_migrations};
