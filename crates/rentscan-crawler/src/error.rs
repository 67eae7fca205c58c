use reqwest::StatusCode;

/// A page could not be downloaded. Ends the walk that requested it.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("{url} answered with status {status}")]
    Status { url: String, status: StatusCode },
    #[error("couldn't decode body: {0}")]
    Decode(#[from] std::io::Error),
}

/// A listing card that cannot be turned into a record. The card is skipped.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ExtractError {
    #[error("listing card has no detail link")]
    MissingUrl,
    #[error("no listing id in detail link {0}")]
    EmptyListingId(String),
}
