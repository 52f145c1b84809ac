// Public API
pub use postgres::PostgresGameStore;
pub use repository::{GameStore, InMemoryGameStore};

// Internal modules
mod postgres;
mod repository;
