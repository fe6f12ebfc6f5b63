//! Ingestion pipeline for NBA highlight videos.
//!
//! Turns a configured list of search terms into a deduplicated, persisted
//! set of video records with up-to-date statistics, against the
//! rate/quota-limited YouTube Data API v3. The binary runs one idempotent
//! ingestion pass; the store's query surface is what a dashboard reads.

pub mod config;
pub mod db;
pub mod errors;
pub mod normalize;
pub mod pipeline;
pub mod store;
pub mod youtube;
