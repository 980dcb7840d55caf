pub use errors::*;
pub use settings::*;

mod errors;
mod settings;
