pub mod features;
pub mod prediction;
pub mod recommendation;

pub use features::*;
pub use prediction::*;
pub use recommendation::*;
