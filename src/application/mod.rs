mod error;
mod request;
mod service;

pub use error::*;
pub use request::*;
pub use service::*;
