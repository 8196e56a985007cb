//! Utility modules for gdg.

mod host;

pub use host::{effective_uid, is_root, short_hostname};
