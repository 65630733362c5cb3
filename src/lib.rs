//! ticketrank: hybrid retrieval over past support tickets.
//!
//! A query is embedded and matched against stored ticket vectors
//! (sqlite-vec) while its keywords are matched against a full-text index
//! (FTS5). The two candidate sets are fused with fixed weights into a
//! short, explainable ranking.

pub mod app;
pub mod cli;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod helpdesk;
pub mod http_client;
pub mod ingest;
pub mod observability;
pub mod reply;
pub mod search;
pub mod server;
pub mod service;
pub mod types;
pub mod workflow;
