//! Chat Relay - Main Library
//!
//! Terminal chat client on top of the `chatwire` transport.
//!
//! ## Architecture
//!
//! - **bin_common**: Common utilities for binary executables (CLI, logging, runners)
//! - **chatwire**: Reconnecting chat transport (re-exported from workspace)
//!
//! ## Usage in Binaries
//!
//! ```rust,ignore
//! use chat_relay::bin_common::{init_tracing, load_config_from_env, ConfigType};
//! use chat_relay::chatwire::ChatClient;
//! ```

// Re-export workspace libraries for convenience
pub use chatwire;

// Binary common utilities
pub mod bin_common {
    //! Common utilities for binary executables

    pub mod cli;
    pub mod logging;
    pub mod runner;

    pub use cli::{compose_outbound, load_config_from_env, load_connection_config, parse_args, ConfigType};
    pub use logging::init_tracing;
    pub use runner::{BinaryRunner, RunConfig};
}
