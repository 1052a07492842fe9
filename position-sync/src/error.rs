use snafu::{IntoError, Location, Snafu};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Snafu)]
#[snafu(module, visibility(pub))]
pub enum Error {
    #[snafu(display("Invalid configuration"))]
    Config {
        #[snafu(implicit)]
        location: Location,
        #[snafu(source)]
        error: config::ConfigError,
    },
    #[snafu(display("Setting '{name}' must be greater than zero"))]
    ZeroSetting {
        #[snafu(implicit)]
        location: Location,
        name: &'static str,
    },
    #[snafu(display("Invalid url '{url}'"))]
    Url {
        #[snafu(implicit)]
        location: Location,
        url: String,
        #[snafu(source)]
        error: url::ParseError,
    },
    #[snafu(display("Failed to build http client"))]
    HttpClient {
        #[snafu(implicit)]
        location: Location,
        #[snafu(source)]
        error: reqwest::Error,
    },
    #[snafu(display("Core error"))]
    Core {
        #[snafu(implicit)]
        location: Location,
        #[snafu(source)]
        error: fleet_core::Error,
    },
    #[snafu(display("The synchronization engine has stopped"))]
    EngineStopped {
        #[snafu(implicit)]
        location: Location,
    },
}

impl From<fleet_core::Error> for Error {
    #[track_caller]
    fn from(value: fleet_core::Error) -> Self {
        error::CoreSnafu.into_error(value)
    }
}
