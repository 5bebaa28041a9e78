//! Configuration section definitions.

mod reload;
mod serve;
mod template;
mod watch;
mod ws;

pub use reload::ReloadConfig;
pub use serve::ServeConfig;
pub use template::TemplateConfig;
pub use watch::WatchConfig;
pub use ws::WsConfig;
