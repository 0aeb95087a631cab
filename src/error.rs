use core::fmt;
use std::io;

pub type DdsResult<T> = std::result::Result<T, DdsError>;

/// Errors returned by DDS operations.
///
/// Every variant corresponds to a non-OK `ReturnCode`.
#[derive(Debug, PartialEq, Eq, Clone, thiserror::Error)]
pub enum DdsError {
    #[error("error: {0}")]
    Error(String),
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error("bad parameter: {0}")]
    BadParameter(String),
    #[error("precondition not met: {0}")]
    PreconditionNotMet(String),
    #[error("out of resources: {0}")]
    OutOfResources(String),
    #[error("not enabled: {0}")]
    NotEnabled(String),
    #[error("immutable policy: {0}")]
    ImmutablePolicy(String),
    #[error("inconsistent policy: {0}")]
    InconsistentPolicy(String),
    #[error("already deleted: {0}")]
    AlreadyDeleted(String),
    #[error("timeout: {0}")]
    Timeout(String),
    #[error("no data")]
    NoData,
    #[error("illegal operation: {0}")]
    IllegalOperation(String),
}

impl DdsError {
    pub fn return_code(&self) -> ReturnCode {
        match self {
            Self::Error(_) => ReturnCode::Error,
            Self::Unsupported(_) => ReturnCode::Unsupported,
            Self::BadParameter(_) => ReturnCode::BadParameter,
            Self::PreconditionNotMet(_) => ReturnCode::PreconditionNotMet,
            Self::OutOfResources(_) => ReturnCode::OutOfResources,
            Self::NotEnabled(_) => ReturnCode::NotEnabled,
            Self::ImmutablePolicy(_) => ReturnCode::ImmutablePolicy,
            Self::InconsistentPolicy(_) => ReturnCode::InconsistentPolicy,
            Self::AlreadyDeleted(_) => ReturnCode::AlreadyDeleted,
            Self::Timeout(_) => ReturnCode::Timeout,
            Self::NoData => ReturnCode::NoData,
            Self::IllegalOperation(_) => ReturnCode::IllegalOperation,
        }
    }
}

impl From<io::Error> for DdsError {
    fn from(e: io::Error) -> Self {
        Self::Error(format!("io error: {e}"))
    }
}

/// DDS v1.4 spec, 2.3.3 DCPS PSM: ReturnCode_t
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(i32)]
pub enum ReturnCode {
    Ok = 0,
    Error = 1,
    Unsupported = 2,
    BadParameter = 3,
    PreconditionNotMet = 4,
    OutOfResources = 5,
    NotEnabled = 6,
    ImmutablePolicy = 7,
    InconsistentPolicy = 8,
    AlreadyDeleted = 9,
    Timeout = 10,
    NoData = 11,
    IllegalOperation = 12,
}

impl ReturnCode {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ok => "DDS_RETCODE_OK",
            Self::Error => "DDS_RETCODE_ERROR",
            Self::Unsupported => "DDS_RETCODE_UNSUPPORTED",
            Self::BadParameter => "DDS_RETCODE_BAD_PARAMETER",
            Self::PreconditionNotMet => "DDS_RETCODE_PRECONDITION_NOT_MET",
            Self::OutOfResources => "DDS_RETCODE_OUT_OF_RESOURCES",
            Self::NotEnabled => "DDS_RETCODE_NOT_ENABLED",
            Self::ImmutablePolicy => "DDS_RETCODE_IMMUTABLE_POLICY",
            Self::InconsistentPolicy => "DDS_RETCODE_INCONSISTENT_POLICY",
            Self::AlreadyDeleted => "DDS_RETCODE_ALREADY_DELETED",
            Self::Timeout => "DDS_RETCODE_TIMEOUT",
            Self::NoData => "DDS_RETCODE_NO_DATA",
            Self::IllegalOperation => "DDS_RETCODE_ILLEGAL_OPERATION",
        }
    }

    pub fn from_result<T>(result: &DdsResult<T>) -> Self {
        match result {
            Ok(_) => Self::Ok,
            Err(e) => e.return_code(),
        }
    }
}

impl fmt::Display for ReturnCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Failure of one step of an example program.
#[derive(Debug, thiserror::Error)]
pub enum ExampleError {
    #[error("Error in {info} with return code : {code}")]
    Status { info: String, code: ReturnCode },
    #[error("Error in {info}: Creation failed: invalid handle")]
    InvalidHandle { info: String },
    #[error("couldn't write output: {0}")]
    Output(#[from] io::Error),
}

/// Accepts `Ok` and `NoData`, everything else becomes `ExampleError::Status`.
pub fn check_status(result: DdsResult<()>, info: &str) -> Result<(), ExampleError> {
    match result {
        Ok(()) | Err(DdsError::NoData) => Ok(()),
        Err(e) => {
            log::error!("{info} failed: {e}");
            Err(ExampleError::Status {
                info: info.to_string(),
                code: e.return_code(),
            })
        }
    }
}

/// Unwraps a created entity, or reports that the creation returned no handle.
pub fn check_handle<T>(result: DdsResult<T>, info: &str) -> Result<T, ExampleError> {
    result.map_err(|e| {
        log::error!("{info} failed: {e}");
        ExampleError::InvalidHandle {
            info: info.to_string(),
        }
    })
}
