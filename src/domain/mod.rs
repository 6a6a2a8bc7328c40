mod account;
mod audit;
mod flag;
mod message;
mod money;
mod transaction;

pub use account::*;
pub use audit::*;
pub use flag::*;
pub use message::*;
pub use money::*;
pub use transaction::*;
