pub mod error;
pub mod module;
pub mod page;
pub mod types;

pub use error::{FieldError, ServiceError};
pub use module::Module;
pub use page::{Links, Page, PageParams, PageQuery, SortOrder};
pub use types::{Envelope, new_id, now_rfc3339};
