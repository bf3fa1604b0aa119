//! Core library for the `surge` load generator.
//!
//! A run compiles a [`template::RequestTemplate`], hands it to the
//! [`scheduler::Scheduler`] together with an idempotency key provider, a
//! response evaluator and a [`transport::Transport`], and reduces the
//! resulting records to [`metrics::AggregateStats`]. The `surge` binary wires
//! these together from CLI flags and an optional config file.
pub mod args;
pub mod config;
pub mod entry;
pub mod error;
pub mod evaluator;
pub mod idempotency;
pub mod logger;
pub mod metrics;
pub mod runner;
pub mod scheduler;
pub mod shutdown;
pub mod shutdown_handlers;
pub mod summary;
pub mod template;
pub mod transport;
