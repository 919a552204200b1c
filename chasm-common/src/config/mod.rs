//! Configuration types for the chasm control client.
//!
//! ## Modules
//!
//! - [`control`]: socket path, protocol generation and frame limits
//! - [`timeouts`]: connect and request bounds

pub mod control;
pub mod timeouts;

pub use control::{ConfigError, ControlConfig, DEFAULT_CONTROL_SOCKET, ProtocolGeneration};
pub use timeouts::{ControlTimeouts, TimeoutConfig};
