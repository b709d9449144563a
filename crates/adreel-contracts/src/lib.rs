pub mod ads;
pub mod brief;
pub mod chat;
pub mod codec;
pub mod events;
pub mod media;
pub mod models;
pub mod progress;
pub mod runs;
