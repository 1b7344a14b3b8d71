pub mod credentials;
pub mod error;
pub mod flow;
pub mod scope;
pub mod token_response;

pub use credentials::*;
pub use error::*;
pub use flow::*;
pub use scope::*;
pub use token_response::*;
