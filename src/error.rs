use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("probe target must not be empty")]
    EmptyTarget,

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),

    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum ControllerError {
    /// `start()` needs a tokio runtime to spawn the probe loop on.
    #[error("no tokio runtime available to run the probe loop: {0}")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),

    #[error("controller must be idle to be reconfigured")]
    NotIdle,
}

#[derive(Error, Debug)]
pub enum ProberError {
    #[error("failed to build DNS resolver: {0}")]
    Resolver(#[from] hickory_resolver::ResolveError),
}
