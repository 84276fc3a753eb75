use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Archive file is in wrong format: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("Failed to parse yaml: {0}")]
    Yaml(#[from] yaml_rust::ScanError),

    /// A document parsed but did not have the expected shape
    #[error("Invalid {document}: {reason}")]
    Schema { document: &'static str, reason: String },

    #[error("Session error: {0}")]
    Session(String),

    #[error("Telemetry error: {0}")]
    Telemetry(String),

    #[error("{0}")]
    Analysis(String),

    #[error("Window error: {0}")]
    Window(String),
}

impl Error {
    pub fn schema(document: &'static str, reason: impl Into<String>) -> Error {
        Error::Schema { document, reason: reason.into() }
    }
}
