pub mod encoding;
pub mod error;
pub mod split;
pub mod types;

pub use encoding::{StringEncoding, UnknownEncoding};
pub use error::{RedirectState, SplitError};
pub use split::{split, split_with_encoding};
pub use types::{NREDIRECTS, ParseResult, Redirect, RedirectMode};
