use core_library::LibraryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DownloadsError {
    #[error("Local store error: {0}")]
    Library(#[from] LibraryError),
}

pub type Result<T> = std::result::Result<T, DownloadsError>;
