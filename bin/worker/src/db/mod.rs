//! Postgres-backed stores for definitions, runs, and continuations.

pub mod definition;
pub mod state;

pub use definition::PgDefinitionStore;
pub use state::PgStateStore;

use darkroom_engine::store::StoreError;

/// Maps a sqlx error to the engine's store error.
pub(crate) fn backend(e: sqlx::Error) -> StoreError {
    StoreError::Backend {
        message: e.to_string(),
    }
}

/// Maps a row decode problem to the engine's store error.
pub(crate) fn decode(context: &str, detail: impl std::fmt::Display) -> StoreError {
    StoreError::Backend {
        message: format!("{context}: {detail}"),
    }
}
