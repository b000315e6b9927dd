pub mod dedupe;
pub mod error;
pub mod mail;
pub mod participation;
pub mod service;
pub mod stats;
pub mod store;
