/// The closed set of failure signals every operation can return.
///
/// Success is `Ok(..)`; each variant maps to a stable numeric code through
/// [`HalError::code`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HalError {
    /// Generic or unclassified failure, including protocol desync and short reads.
    #[error("operation failed: {0}")]
    Failed(String),

    /// The slot already has an operation in flight, or init was repeated.
    #[error("device busy")]
    Busy,

    /// A blocking wait exceeded the caller's timeout.
    #[error("operation timed out")]
    TimedOut,

    /// Bad device index, missing buffer, zero length or incomplete backend.
    #[error("invalid parameter: {0}")]
    InvalidParameter(&'static str),

    /// Slot never initialized, no backend registered, or peer unreachable.
    #[error("not initialized")]
    NotInitialized,

    /// Reserved.
    #[error("no data available")]
    NoData,
}

impl HalError {
    pub const OK_CODE: i32 = 0;

    /// Stable numeric code for this error.
    pub fn code(&self) -> i32 {
        match self {
            HalError::Failed(_) => -1,
            HalError::Busy => -2,
            HalError::TimedOut => -3,
            HalError::InvalidParameter(_) => -4,
            HalError::NotInitialized => -5,
            HalError::NoData => -6,
        }
    }

    /// Rebuild an error from its numeric code.
    ///
    /// Returns `None` for [`HalError::OK_CODE`]; unknown negative or positive
    /// codes become [`HalError::Failed`].
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            Self::OK_CODE => None,
            -2 => Some(HalError::Busy),
            -3 => Some(HalError::TimedOut),
            -4 => Some(HalError::InvalidParameter("rejected by backend")),
            -5 => Some(HalError::NotInitialized),
            -6 => Some(HalError::NoData),
            -1 => Some(HalError::Failed("backend reported error".to_string())),
            other => Some(HalError::Failed(format!("unknown status code {other}"))),
        }
    }
}

pub type Result<T> = std::result::Result<T, HalError>;
