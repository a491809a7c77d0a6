mod api_error;
mod error;
mod response;

pub use api_error::flatten_errors;
pub use error::{ApiError, ErrorKind, TransportError, TransportErrorKind};
pub use response::ResponseBody;
pub(crate) use response::is_json;

/// The `herald_lib` `Result` type
pub type Result<T> = std::result::Result<T, crate::ErrorKind>;
