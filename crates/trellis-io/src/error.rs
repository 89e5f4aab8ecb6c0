use thiserror::Error;
use trellis_build::BuilderError;
use trellis_map::MapError;
use trellis_types::TypeError;

/// Errors raised while moving builder trees in and out of storage.
#[derive(Debug, Error)]
pub enum IoError {
    /// The storage root holds no typed object to read.
    #[error("storage root of {source_name} holds no typed object")]
    NoTypedRoot { source_name: String },

    /// The storage root holds more than one typed object.
    #[error("storage root of {source_name} holds {count} typed objects, expected one")]
    AmbiguousRoot { source_name: String, count: usize },

    /// A link's target cannot be reached from this backend.
    #[error("cannot resolve link target {path:?} from {source_name}")]
    UnresolvedLink { path: String, source_name: String },

    /// Reading from a backend that was never written.
    #[error("backend {source_name} holds no data")]
    Empty { source_name: String },

    #[error(transparent)]
    Map(#[from] MapError),

    #[error(transparent)]
    Builder(#[from] BuilderError),

    #[error(transparent)]
    Value(#[from] TypeError),
}

/// Convenience alias used throughout the io crate.
pub type IoResult<T> = Result<T, IoError>;
