//! Built-in node kind implementations (spec §4.2's table).

pub mod aggregate;
pub mod code;
pub mod combine;
pub mod input;
pub mod output;
pub mod transform;
