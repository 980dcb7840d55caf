pub use identity::*;
pub use monitor::*;

mod identity;
mod monitor;
