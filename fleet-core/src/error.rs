use snafu::{Location, Snafu};

pub type CoreResult<T> = std::result::Result<T, Error>;

/// Boxed source for errors originating in transport crates the core does not depend on.
pub type BoxedError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Snafu)]
#[snafu(module(core_error), visibility(pub))]
pub enum Error {
    #[snafu(display("Transport error against '{target}'"))]
    Transport {
        #[snafu(implicit)]
        location: Location,
        target: String,
        #[snafu(source)]
        error: BoxedError,
    },
    #[snafu(display("Request failed, status: '{status}', url: '{url}', body: '{body}'"))]
    FailedRequest {
        #[snafu(implicit)]
        location: Location,
        url: String,
        status: u16,
        body: String,
    },
    #[snafu(display("Failed to parse json payload"))]
    Json {
        #[snafu(implicit)]
        location: Location,
        #[snafu(source)]
        error: serde_json::Error,
    },
    #[snafu(display("Rendering surface rejected '{operation}', reason: '{reason}'"))]
    Sink {
        #[snafu(implicit)]
        location: Location,
        operation: &'static str,
        reason: String,
    },
}

#[derive(Debug, Snafu)]
#[snafu(module, visibility(pub))]
pub enum MmsiError {
    #[snafu(display("Mmsi '{value}' is outside the valid range"))]
    Range {
        #[snafu(implicit)]
        location: Location,
        value: i64,
    },
    #[snafu(display("Failed to parse mmsi '{value}'"))]
    Parse {
        #[snafu(implicit)]
        location: Location,
        value: String,
        #[snafu(source)]
        error: std::num::ParseIntError,
    },
}

impl Error {
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::FailedRequest { status, .. } => Some(*status),
            Error::Transport { .. } | Error::Json { .. } | Error::Sink { .. } => None,
        }
    }
}
