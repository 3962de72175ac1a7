use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("insufficient data")]
    InsufficientData,

    #[error("requested bar count exceeds buffer capacity")]
    BufferTooSmall,

    #[error("unknown symbol: {0}")]
    UnknownSymbol(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(String),

    #[error("bad market data: {0}")]
    MarketData(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("venue rejected: {0}")]
    VenueRejected(String),

    #[error("cancelled")]
    Cancelled,

    #[error("timed out")]
    Timeout,

    #[error("{0}: {1}")]
    Context(String, #[source] Box<Error>),

    #[error("{}", join_messages(.0))]
    Aggregate(Vec<Error>),
}

fn join_messages(errors: &[Error]) -> String {
    let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
    messages.join("; ")
}

impl Error {
    /// Wrap an error with a short description of the failed operation.
    pub fn context(self, msg: impl Into<String>) -> Self {
        Error::Context(msg.into(), Box::new(self))
    }

    /// Collapse worker failures into a single error.
    pub fn aggregate(mut errors: Vec<Error>) -> Self {
        if errors.len() == 1 {
            errors.remove(0)
        } else {
            Error::Aggregate(errors)
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
