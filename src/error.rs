use thiserror::Error;

/// Failure of a single call to the odds provider.
///
/// Never escapes `OddsApiClient`: every variant is logged and turned into an
/// empty result at the `OddsProvider` boundary.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider returned HTTP {0}")]
    Status(reqwest::StatusCode),
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected payload: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Outcome of a refresh that produced nothing servable.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    #[error("API rate limit exhausted before any games could be fetched")]
    RateLimited,
    #[error("no games could be fetched from the odds provider: {0}")]
    TotalFetchFailure(String),
}
