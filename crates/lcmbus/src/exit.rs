use std::fmt;
use std::io;

use lcmbus_log::LogError;
use lcmbus_net::NetError;
use lcmbus_wire::WireError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const NETWORK_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused | io::ErrorKind::NotFound => FAILURE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn wire_error(context: &str, err: WireError) -> CliError {
    match err {
        WireError::Io(source) => io_error(context, source),
        WireError::ChannelTooLong { .. } | WireError::PayloadTooLarge { .. } => {
            CliError::new(USAGE, format!("{context}: {err}"))
        }
        other => CliError::new(DATA_INVALID, format!("{context}: {other}")),
    }
}

pub fn net_error(context: &str, err: NetError) -> CliError {
    match err {
        NetError::Io(source) => io_error(context, source),
        NetError::Wire(source) => wire_error(context, source),
        NetError::Cancelled => CliError::new(TIMEOUT, format!("{context}: {err}")),
        NetError::MulticastAddressRequired { .. }
        | NetError::InterfaceNotFound { .. }
        | NetError::InterfaceNotUp { .. }
        | NetError::InterfaceNotMulticast { .. }
        | NetError::InterfaceHasNoAddress { .. }
        | NetError::NoMulticastInterface => CliError::new(USAGE, format!("{context}: {err}")),
        NetError::Decompress(_) | NetError::MultipleParams { .. } | NetError::TypedDecode { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        other => CliError::new(NETWORK_ERROR, format!("{context}: {other}")),
    }
}

pub fn log_error(context: &str, err: LogError) -> CliError {
    match err {
        LogError::Io(source) => io_error(context, source),
        LogError::Wire(source) => wire_error(context, source),
        LogError::Net(source) => net_error(context, source),
        LogError::Decompress(_) => CliError::new(DATA_INVALID, format!("{context}: {err}")),
    }
}
