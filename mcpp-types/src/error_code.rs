/// The stable wire error codes the dispatcher reports.
///
/// These are JSON-RPC 2.0 `error.code` values. The standard JSON-RPC
/// reserved codes (`-32602`, `-32601`, `-32603`) are included alongside the
/// MCPP-specific range (`-32001`..`-32010`) so the dispatcher has a single
/// place to go from a typed failure to the number a client sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    InvalidParams,
    MethodNotFound,
    InternalError,
    CacheMiss,
    ReferenceNotFound,
    ResolutionFailed,
    DataNotFound,
    InsufficientPermissions,
    InvalidDataUsage,
    ConsentRequired,
    ConsentDenied,
    ConsentTimeout,
    InvalidTarget,
}

impl ErrorCode {
    pub const fn code(self) -> i64 {
        match self {
            ErrorCode::InvalidParams => -32602,
            ErrorCode::MethodNotFound => -32601,
            ErrorCode::InternalError => -32603,
            ErrorCode::CacheMiss => -32001,
            ErrorCode::ReferenceNotFound => -32002,
            ErrorCode::ResolutionFailed => -32003,
            ErrorCode::DataNotFound => -32004,
            ErrorCode::InsufficientPermissions => -32005,
            ErrorCode::InvalidDataUsage => -32006,
            ErrorCode::ConsentRequired => -32007,
            ErrorCode::ConsentDenied => -32008,
            ErrorCode::ConsentTimeout => -32009,
            ErrorCode::InvalidTarget => -32010,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            ErrorCode::InvalidParams => "INVALID_PARAMS",
            ErrorCode::MethodNotFound => "METHOD_NOT_FOUND",
            ErrorCode::InternalError => "INTERNAL_ERROR",
            ErrorCode::CacheMiss => "CACHE_MISS",
            ErrorCode::ReferenceNotFound => "REFERENCE_NOT_FOUND",
            ErrorCode::ResolutionFailed => "RESOLUTION_FAILED",
            ErrorCode::DataNotFound => "DATA_NOT_FOUND",
            ErrorCode::InsufficientPermissions => "INSUFFICIENT_PERMISSIONS",
            ErrorCode::InvalidDataUsage => "INVALID_DATA_USAGE",
            ErrorCode::ConsentRequired => "CONSENT_REQUIRED",
            ErrorCode::ConsentDenied => "CONSENT_DENIED",
            ErrorCode::ConsentTimeout => "CONSENT_TIMEOUT",
            ErrorCode::InvalidTarget => "INVALID_TARGET",
        }
    }
}

impl From<ErrorCode> for i64 {
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name(), self.code())
    }
}
