use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Core initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Configuration error: {0}")]
    Config(#[from] core_runtime::Error),

    #[error("Library error: {0}")]
    Library(#[from] core_library::LibraryError),

    #[error("Downloads error: {0}")]
    Downloads(#[from] core_downloads::DownloadsError),

    #[error("Sync error: {0}")]
    Sync(#[from] core_sync::SyncError),

    #[error("Media server error: {0}")]
    Server(#[from] provider_jellyfin::JellyfinError),
}

pub type Result<T> = std::result::Result<T, CoreError>;
