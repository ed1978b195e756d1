//! `usersync` core: user record model, dynamic values and push keys.

pub mod paths;
pub mod push_key;
pub mod types;
pub mod user;

pub use paths::{image_path, key_violation, IMAGES_PREFIX, USERS_ROOT};
pub use push_key::{fallback_key, ClockSource, PushKeyGenerator, SystemClock, PUSH_KEY_LEN};
pub use types::{Document, Value};
pub use user::{DecodeWarning, Decoded, User, UserPatch};
