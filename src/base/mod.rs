//! Base Module
//!
//! Value types shared by every layer of the client: the server's error codes
//! and the partition identifier (gpid).

mod error_code;
mod gpid;

pub use error_code::ErrorCode;
pub use gpid::Gpid;
