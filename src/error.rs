use std::fmt;

/// Fatal errors for a scan run. Per-address lookup failures are not here,
/// they degrade to an unknown confidence inside the keyed pass instead.
#[derive(Debug)]
pub enum ScanError {
    /// A line in the input file isn't a valid IPv4/IPv6 literal.
    InvalidInput(String),
    /// A blocklist tier couldn't be retrieved. Fatal for the whole run.
    SourceUnavailable {
        level: u8,
        reason: String,
    },
    /// The run was asked to use the keyed service without a usable credential.
    ConfigurationError(String),
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanError::InvalidInput(msg) => write!(f, "invalid input: {}", msg),
            ScanError::SourceUnavailable { level, reason } =>
                write!(f, "blocklist tier {} is unavailable: {}", level, reason),
            ScanError::ConfigurationError(msg) => write!(f, "configuration error: {}", msg),
        }
    }
}

impl std::error::Error for ScanError {}
