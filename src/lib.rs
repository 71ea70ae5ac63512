//! Content-addressed image uploads to a CDN-backed object store
//!
//! Images are hashed, looked up in a local record store and only uploaded
//! when their content has never been seen before. The stored records double
//! as an upload history that supports remote deletion.

pub mod app;
pub mod error;
pub mod gateway;
pub mod hasher;
pub mod history;
pub mod models;
pub mod present;
pub mod store;
pub mod uploader;

pub use error::{Error, Result};
