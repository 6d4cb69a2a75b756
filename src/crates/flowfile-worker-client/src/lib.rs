//! The server-side half of the worker IPC boundary (C4, spec §4.4):
//! `TcpWorkerClient` implements `flowfile_scheduler::WorkerClient` over a
//! pool of persistent, auto-reconnecting TCP connections to the
//! out-of-process worker. Grounded on `orchestrator::client::AcoClient`
//! (persistent connection, id-correlated responses) and `orca::executor`'s
//! `RetryConfig` (exponential backoff), generalized to a connection pool
//! with a crash-count circuit breaker.

mod client;
mod config;
mod retry;

pub use client::TcpWorkerClient;
pub use config::{WorkerClientConfig, DEFAULT_CIRCUIT_BREAK_THRESHOLD, DEFAULT_CIRCUIT_BREAK_WINDOW, DEFAULT_TASK_TIMEOUT};
pub use retry::RetryConfig;
