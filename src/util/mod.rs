//! Small helpers shared by the renderer, the drawer and the fetcher.
//!
//! - **URL validation**: refuses local-network targets before fetching and
//!   non-browser schemes before opening
//! - **Time formatting**: chrono-based date/time lines with a safe fallback

mod time;
mod url_validator;

pub use time::format_timestamp;
pub use url_validator::{validate_url, validate_url_for_open, UrlValidationError};
