pub mod api;
pub mod context;
pub mod error;
pub mod schema;
pub mod value;

pub use api::*;
pub use context::{ResolutionContext, is_self_reference};
pub use error::{Operation, PersistError, PersistResult};
pub use schema::*;
pub use value::*;
