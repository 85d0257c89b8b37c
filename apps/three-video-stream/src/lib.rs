pub mod config;
pub mod graph;
pub mod gst_utils;
pub mod layout;
pub mod pipeline;
pub mod resolver;
pub mod service;
pub mod stream;

// Re-export commonly used types
pub use config::StreamConfig;
pub use graph::CompositorGraph;
pub use layout::{Layout, TileGeometry};
pub use pipeline::LifecycleController;
pub use resolver::PortResolver;
pub use stream::ThreeVideoStream;

use thiserror::Error;

/// Every failure the compositor can report.
///
/// The variants are split into two classes. Fatal errors mean the static graph
/// or the engine itself is unusable and the process has to stop once the
/// pipeline has been released. Non-fatal errors concern a single live source
/// and are only logged; the mixer then simply lacks that tile.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to construct element '{name}' from factory '{factory}'")]
    Construction { factory: String, name: String },

    #[error("Failed to link '{src}' to '{sink}'")]
    StaticLink { src: String, sink: String },

    #[error("Failed to request a sink pad from '{element}'")]
    PadRequest { element: String },

    #[error("Pipeline rejected the transition to {state:?}")]
    StateTransition { state: gst::State },

    #[error("Pipeline rejected the end-of-stream event")]
    EosRejected,

    #[error("Error from element {source_path}: {message}")]
    Engine {
        source_path: String,
        message: String,
        debug: Option<String>,
    },

    #[error("Failed to link pad '{pad}' of '{source_name}': {reason}")]
    DynamicLink {
        source_name: String,
        pad: String,
        reason: String,
    },

    #[error("Unsupported pad '{pad}' on '{source_name}'")]
    UnsupportedPort { source_name: String, pad: String },

    #[error("Pad added on unexpected element '{0}'")]
    UnknownSource(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the error must terminate the process.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Error::DynamicLink { .. } | Error::UnsupportedPort { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
