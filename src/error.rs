use thiserror::Error;

/// Failures scoped to a single quote request. Each one is shown on the page
/// that answers the request; none of them stops the server.
#[derive(Error, Debug)]
pub enum QuoteError {
    #[error("Unsupported chain: {0}")]
    UnsupportedChain(String),

    #[error("Unknown token {symbol} on {chain}")]
    UnknownToken { chain: String, symbol: String },

    /// The GraphQL endpoint answered with a non-success status.
    #[error("Aave API error {0}")]
    UpstreamStatus(u16),

    /// Connection failure or the request timeout elapsed.
    #[error("Aave API request failed: {0}")]
    UpstreamRequest(#[from] reqwest::Error),

    #[error(transparent)]
    UpstreamData(#[from] UpstreamDataError),
}

/// The API answered 2xx but the payload is unusable.
#[derive(Error, Debug)]
pub enum UpstreamDataError {
    #[error("No reserve data")]
    MissingReserve,

    #[error("No reserve data: {0}")]
    Graphql(String),

    #[error("Reserve data is missing {0}")]
    MissingField(&'static str),

    #[error("Invalid decimal in {field}: {value:?}")]
    InvalidDecimal { field: &'static str, value: String },

    #[error("Malformed Aave API response: {0}")]
    InvalidBody(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing environment variable {0}")]
    MissingVar(&'static str),

    #[error("{var} is not valid JSON: {source}")]
    InvalidJson {
        var: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid value for {var}: {value:?}")]
    InvalidValue { var: &'static str, value: String },

    #[error("Chain {chain} in TOKENS_JSON has a non-string address for {symbol}")]
    InvalidTokenAddress { chain: String, symbol: String },
}
