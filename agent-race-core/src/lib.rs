pub mod domain;
pub mod error;
pub mod live_url;
pub mod session;

pub use domain::*;
pub use error::*;
pub use live_url::{extract_live_url, sanitize_live_url, strip_ansi};
pub use session::*;
