pub mod collateral;
pub mod draft;
pub mod entry;
pub mod state;

pub use collateral::*;
pub use draft::*;
pub use entry::*;
pub use state::*;
