pub mod error;
pub mod store;
pub mod validator;

pub use error::FileServerError;
pub use store::{build_store, MutableFileStore};
pub use validator::Sandbox;
