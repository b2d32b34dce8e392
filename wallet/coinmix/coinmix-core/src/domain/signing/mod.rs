pub mod message;
pub mod script;

pub use message::*;
pub use script::*;
