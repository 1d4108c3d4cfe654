pub mod error;
pub mod file;
pub mod key;
pub mod traits;

pub use error::BlobError;
pub use file::FileStore;
pub use key::{content_type_for, extension_for, upload_key};
pub use traits::BlobStore;
