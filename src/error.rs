use std::net::IpAddr;
use std::path::PathBuf;
use std::process::ExitStatus;

/// Error types for the geotrace library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No City database file was found in the searched directory.
    #[error("no City database found in {path} (looked for {candidates})")]
    DatabaseNotFound { path: PathBuf, candidates: String },

    /// The City database exists but could not be opened.
    #[error("failed to open database {path}")]
    DatabaseOpen {
        path: PathBuf,
        #[source]
        source: maxminddb::MaxMindDBError,
    },

    /// IP address lookup failed in the City database.
    #[error("geolocation lookup failed for {ip}")]
    LookupFailed {
        ip: IpAddr,
        #[source]
        source: maxminddb::MaxMindDBError,
    },

    /// The RDAP query for an address failed at the transport or decode level.
    #[error("RDAP query failed for {ip}")]
    Rdap {
        ip: IpAddr,
        #[source]
        source: reqwest::Error,
    },

    /// The HTTP client itself could not be constructed.
    #[error("failed to build HTTP client")]
    HttpClient(#[source] reqwest::Error),

    /// The trace program could not be started.
    #[error("failed to start {program}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The trace program exited unsuccessfully.
    #[error("{program} exited with {status}: {stderr}")]
    TraceFailed {
        program: String,
        status: ExitStatus,
        stderr: String,
    },

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for Results using the library error.
pub type Result<T> = std::result::Result<T, Error>;
