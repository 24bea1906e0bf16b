//! Cutline Transport
//!
//! Reliable, order-preserving channels between neighboring nodes. Every channel carries
//! length-prefixed `bincode` frames of [`cutline_core::Message`] and starts with a handshake
//! in which the dialing side announces its node id.
//!
//! Two implementations share the framing code:
//! - [`TcpTransport`] for one-process-per-node deployments
//! - [`MemoryTransport`] for in-process simulation and tests

pub mod channel;
pub mod error;
pub mod frame;
pub mod memory;
pub mod tcp;
pub mod traits;

pub use channel::Channel;
pub use error::{TransportError, TransportResult};
pub use frame::{FrameReader, FrameWriter, MAX_FRAME_LEN};
pub use memory::{MemoryListener, MemoryTransport};
pub use tcp::{TcpChannelListener, TcpTransport};
pub use traits::{Listener, Transport};
