pub use errors::*;
pub use player::*;

mod errors;
mod player;
