pub mod config;
pub mod dispatch;
pub mod players;
pub mod tracker;
pub mod tracking;
