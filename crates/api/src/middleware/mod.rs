//! Request extractors.
//!
//! - [`auth::CallerIdentity`] -- the caller's user id, used to stamp `owner_id`.

pub mod auth;
