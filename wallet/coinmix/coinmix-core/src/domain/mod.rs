//! Domain layer: pure protocol rules with no I/O.

pub mod denomination;
pub mod hashes;
pub mod payment;
pub mod queue;
pub mod relay;
pub mod rounds;
pub mod session;
pub mod signing;
pub mod transaction;

pub use denomination::*;
pub use payment::*;
pub use queue::*;
pub use relay::*;
pub use session::*;
pub use signing::*;
pub use transaction::*;
