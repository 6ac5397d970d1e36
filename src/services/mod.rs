//! Service layer: game lifecycle, round hosting, connections, and content.

pub mod content;
pub mod documentation;
pub mod game_host;
pub mod game_service;
pub mod health_service;
pub mod platform;
pub mod websocket_service;
