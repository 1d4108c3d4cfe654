pub mod claims;
pub mod tweet;
pub mod user;

pub use claims::{Claims, Purpose};
pub use tweet::{ImageUpload, ReplyRef, TweetInput, TweetKind, TweetView};
pub use user::{Credentials, PasswordReset, ProfilePatch, Registration, User, UserSummary};
