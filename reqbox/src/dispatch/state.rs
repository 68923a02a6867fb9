use std::fmt;

/// Lifecycle of one logical request, as reported in logs.
///
/// `Built` leads to exactly one of `ShortCircuited`, `CacheHit` or
/// `Dispatching`. Dispatching repeats once per attempt and ends in one of
/// the remaining terminal states. No state is entered twice except
/// `Dispatching` with a growing attempt number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum State {
    Built,
    ShortCircuited,
    CacheHit,
    Dispatching { attempt: u32 },
    Succeeded,
    RetryExhausted,
    TransportError,
    CacheBackendError,
    Cancelled,
}

impl State {
    pub(crate) fn is_terminal(self) -> bool {
        !matches!(self, Self::Built | Self::Dispatching { .. })
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Built => f.write_str("built"),
            Self::ShortCircuited => f.write_str("short_circuited"),
            Self::CacheHit => f.write_str("cache_hit"),
            Self::Dispatching { attempt } => write!(f, "dispatching[{attempt}]"),
            Self::Succeeded => f.write_str("succeeded"),
            Self::RetryExhausted => f.write_str("retry_exhausted"),
            Self::TransportError => f.write_str("transport_error"),
            Self::CacheBackendError => f.write_str("cache_backend_error"),
            Self::Cancelled => f.write_str("cancelled"),
        }
    }
}
