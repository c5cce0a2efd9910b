pub mod dispatch;
pub mod emergency;
pub mod error;
pub mod ports;
pub mod sms;
pub mod util;

pub type DomainResult<T> = Result<T, error::DomainError>;
