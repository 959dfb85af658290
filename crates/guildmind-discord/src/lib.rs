pub mod commands;
pub mod handler;
pub mod history;
pub mod permissions;
pub mod surface;
pub mod tools;

pub use handler::{BotContext, GuildmindHandler};
pub use history::DiscordHistory;
pub use surface::DiscordSurface;
pub use tools::build_toolset;
