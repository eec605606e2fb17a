pub mod auth;
pub(crate) mod flags_helper;
pub mod utf16;
