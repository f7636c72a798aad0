//! kiosk-session — Avatar session coordination for the kiosk.
//!
//! Persona configuration, session token issuance, the remote avatar session
//! seam, and the coordinator that starts exactly one session when a customer
//! steps into range.

pub mod auth;
pub mod avatar;
pub mod controller;
pub mod coordinator;
pub mod error;
pub mod persona;
pub mod status;

pub use auth::{AuthConfig, HttpTokenIssuer, SessionToken, TokenIssuer};
pub use avatar::{AvatarConnector, AvatarSession, SessionHandle};
pub use controller::KioskController;
pub use coordinator::{CoordinatorConfig, SessionCoordinator, SessionState};
pub use error::{SessionError, SessionResult};
pub use persona::{KioskPersona, PersonaConfig, PersonaError};
pub use status::{KioskStatus, StatusBoard};
