use std::{ fmt, net::IpAddr };

/// Abuse confidence for one address, 0 to 100. `Unknown` marks a lookup
/// that failed softly and never outranks a numeric score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Confidence {
    Score(f64),
    Unknown,
}

impl Confidence {
    pub fn is_score(&self) -> bool {
        matches!(self, Confidence::Score(_))
    }

    /// Max of the two under the rule that `Unknown` loses to any score.
    pub fn better(self, other: Confidence) -> Confidence {
        match (self, other) {
            (Confidence::Score(a), Confidence::Score(b)) => {
                if b > a { other } else { self }
            }
            (Confidence::Unknown, Confidence::Score(_)) => other,
            _ => self,
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Confidence::Score(s) => write!(f, "{}", s),
            Confidence::Unknown => write!(f, "N/A"),
        }
    }
}

/// Where a signal came from: one blocklist tier, or the keyed service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    Tier(u8),
    Reputation,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Tier(level) => write!(f, "{}", level),
            Source::Reputation => write!(f, "abuseipdb"),
        }
    }
}

/// One signal produced by a single scan pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreObservation {
    pub ip: IpAddr,
    pub source: Source,
    pub confidence: Confidence,
}

/// Output of one tier or keyed pass, consumed by a single merge.
#[derive(Debug, Default)]
pub struct ScanBatch {
    pub observations: Vec<ScoreObservation>,
    /// Addresses flagged by the tier, or numerically scored by the keyed pass.
    pub flagged: usize,
}
