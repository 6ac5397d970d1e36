//! Persistence layer: the [`game_store::GameStore`] abstraction and its
//! in-memory backend.

pub mod game_store;
pub mod memory;
pub mod storage;
