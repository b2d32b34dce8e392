pub mod announce;
pub mod node;
pub mod score;

pub use announce::*;
pub use node::*;
pub use score::*;
