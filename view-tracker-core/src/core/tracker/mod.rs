pub use events::*;
pub use tracker::*;

mod events;
mod tracker;
