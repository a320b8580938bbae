mod normalize;
pub mod output;
mod registry;
mod traits;

// Built-in handlers
mod archive_today;
mod download;
mod monolith;
mod wayback;
mod ytdlp;

use std::sync::Arc;

pub use archive_today::ArchiveTodayHandler;
pub use download::DownloadHandler;
pub use monolith::MonolithHandler;
pub use normalize::{normalize_url, NormalizeError, NormalizeOptions};
pub use registry::{HandlerRegistry, RegistryError};
pub use traits::{HandleOutcome, Handler, HandlerError};
pub use wayback::WaybackHandler;
pub use ytdlp::YtDlpHandler;

use crate::config::Config;

/// Build the registry of built-in handlers.
///
/// # Errors
///
/// Returns an error if a handler cannot be constructed or registered. Either
/// case fails the whole run.
pub fn default_registry(config: &Config) -> anyhow::Result<HandlerRegistry> {
    let mut registry = HandlerRegistry::new();
    registry.register(Arc::new(WaybackHandler::new(config)?))?;
    registry.register(Arc::new(ArchiveTodayHandler::new(config)?))?;
    registry.register(Arc::new(MonolithHandler::new(config)))?;
    registry.register(Arc::new(YtDlpHandler::new(config)))?;
    registry.register(Arc::new(DownloadHandler::new(config)?))?;
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_handles() {
        let registry = default_registry(&Config::for_testing()).unwrap();
        assert_eq!(
            registry.handles(),
            vec!["archivetoday", "audio", "file", "monolith", "video", "wayback"]
        );
        assert_eq!(registry.len(), 5);
    }
}
