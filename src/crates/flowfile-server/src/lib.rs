//! flowfile-server: the HTTP/WS façade (C7) — flow CRUD, editor and
//! run-control surface of spec §6, plus run-history persistence.
//! Grounded on `orchestrator`'s crate layout (`api`, `db`, one
//! `ServerConfig::from_env`), narrowed to the single `runs` table this
//! façade needs rather than the teacher's full task/workflow/bug schema.

pub mod api;
pub mod config;
pub mod db;

pub use config::ServerConfig;
