mod client;
mod error;

pub use interviewer_types as types;

pub use client::config::Config;
pub use client::{ChannelEvent, Client, EventRx, Stats, connect, connect_with_config};
pub use error::ChannelError;
