mod credential;
mod handlers;
mod middleware;
mod response;

pub mod boundary;
pub mod config;
pub mod factory;
pub mod restful;
pub mod target;

pub use boundary::AuthBoundary;
pub use handlers::verify::AUTH_PRINCIPAL_HEADER;
pub use middleware::{authenticate, authenticate_forwarded, FORWARDED_METHOD, FORWARDED_URI};
