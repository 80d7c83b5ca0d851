pub mod error;
pub mod game_lobby;
pub mod handlers;
pub mod models;
pub mod player;
pub mod registry;
pub mod websocket;
