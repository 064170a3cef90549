//! Realtime event stream: frames, transport seam and the session state machine.

mod frame;
mod session;
mod transport;

#[cfg(feature = "native")]
mod tokio_transport;

pub use frame::StreamFrame;
pub use session::{SessionHandle, SessionState, StreamSession};
pub use transport::{StreamConnector, StreamMessage, StreamTransport};

#[cfg(feature = "native")]
pub use tokio_transport::{TokioConnector, TokioTransport};
