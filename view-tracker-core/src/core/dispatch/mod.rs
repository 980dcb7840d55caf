pub use dispatcher::*;
pub use errors::*;
pub use http::*;
pub use report::*;
pub use transport::*;

mod dispatcher;
mod errors;
mod http;
mod report;
mod transport;
