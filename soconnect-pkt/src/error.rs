use core::fmt;

/// The shared result type used across every SoConnect crate.
pub type Result<T> = core::result::Result<T, Error>;

/// The SoConnect error taxonomy (spec §7).
///
/// Every crate in the workspace (packet toolkit, driver wrapper, runtime)
/// returns this one sum type so that startup failures, driver failures and
/// configuration failures can be reported uniformly.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Error {
    kind: ErrorKind,
    msg: alloc::string::String,
}

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum ErrorKind {
    /// Pool or buffer allocation failed.
    Memory,
    /// A named resource (port by MAC, file by path, logical id) is not present.
    NotExist,
    /// A configuration field is out of range, or an enum token is unknown.
    InvalidValue,
    /// A driver/system call returned a failure the core cannot paper over.
    Internal,
    /// An optional hook was not supplied; the framework treats this as "skip".
    NotImplemented,
    /// Used only by iterators that report "more work remains".
    NotFinished,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn msg(&self) -> &str {
        &self.msg
    }

    pub fn memory<S: Into<alloc::string::String>>(msg: S) -> Self {
        Self { kind: ErrorKind::Memory, msg: msg.into() }
    }

    pub fn not_exist<S: Into<alloc::string::String>>(msg: S) -> Self {
        Self { kind: ErrorKind::NotExist, msg: msg.into() }
    }

    pub fn invalid_value<S: Into<alloc::string::String>>(msg: S) -> Self {
        Self { kind: ErrorKind::InvalidValue, msg: msg.into() }
    }

    pub fn internal<S: Into<alloc::string::String>>(msg: S) -> Self {
        Self { kind: ErrorKind::Internal, msg: msg.into() }
    }

    pub fn not_implemented<S: Into<alloc::string::String>>(msg: S) -> Self {
        Self { kind: ErrorKind::NotImplemented, msg: msg.into() }
    }

    pub fn not_finished<S: Into<alloc::string::String>>(msg: S) -> Self {
        Self { kind: ErrorKind::NotFinished, msg: msg.into() }
    }

    pub fn to_err<T>(self) -> Result<T> {
        Err(self)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            ErrorKind::Memory => "memory",
            ErrorKind::NotExist => "not-exist",
            ErrorKind::InvalidValue => "invalid-value",
            ErrorKind::Internal => "internal",
            ErrorKind::NotImplemented => "not-implemented",
            ErrorKind::NotFinished => "not-finished",
        };
        write!(f, "soconnect error ({kind}): {}", self.msg)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}
