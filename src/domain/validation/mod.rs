//! Static safety gate every generated statement passes before execution

mod dialect;
mod validator;
mod verdict;

pub use validator::{SqlValidator, DEFAULT_ROW_CAP};
pub use verdict::{RejectionReason, ValidationRejection, ValidationVerdict};
