//! Worker IPC wire format (C4, spec §4.4 and §6): the frame vocabulary and
//! the length-delimited `Encoder`/`Decoder` pair both sides of the worker
//! socket share. Grounded on `tooling::runtime::messages`'s
//! request/response/event/heartbeat message family, collapsed into one
//! tagged [`Frame`] enum and framed the way spec §6 describes literally
//! ("length-prefixed with a tag byte").

mod codec;
mod frame;

pub use codec::{CodecError, FrameCodec};
pub use frame::{Frame, FrameErrorKind};

/// Idle keepalive interval and the grace period a `ping` may go
/// unanswered before the connection is declared `worker-lost` (spec §6:
/// "ping every 5s when idle; pong required within 5s").
pub const KEEPALIVE_INTERVAL: std::time::Duration = std::time::Duration::from_secs(5);
pub const KEEPALIVE_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);
