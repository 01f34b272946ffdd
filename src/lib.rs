//! # Easy Block
//!
//! An in-page agent that adds a one-click block button to every post card of a
//! live, continuously re-rendering timeline.
//!
//! The remote API needs a bearer token the agent is never given. It is picked
//! out of the host page's own outgoing requests, then combined with the
//! session's anti-forgery cookie for each call.
//!
//! ## Architecture
//!
//! ```text
//!   host requests ──► CredentialInterceptor ──► CredentialCell
//!                                                     │
//!   click ──► BlockAgent ──► XApiClient ──► CredentialProvider
//!               ▲   │             │
//!   mutations ──┘   ▼             ▼
//!             ActionControl   lookup / block
//! ```
//!
//! ## Modules
//! - `transport`: fetch-like and XHR-like outbound surfaces
//! - `credentials`: token capture and header assembly
//! - `remote`: profile lookup and block calls
//! - `dom`: live document model and the control state machine
//! - `agent`: discovery, debounced re-scan, activation pipeline
//! - `install`: wires the above in the required order

pub mod agent;
pub mod config;
pub mod credentials;
pub mod dom;
pub mod error;
pub mod install;
pub mod logging;
pub mod remote;
pub mod transport;

pub use agent::{ActivationOutcome, BlockAgent};
pub use config::Config;
pub use error::{AgentError, AgentResult};
pub use install::{install, install_with_transport, Installation};
