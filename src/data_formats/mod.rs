mod query;
mod request;
mod response;
mod wrapper;

pub use query::*;
pub use request::*;
pub use response::*;
pub use wrapper::*;
