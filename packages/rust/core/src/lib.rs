//! Endpoint semantics for LineupRelay, free of HTTP framework types.
//!
//! [`Relay`] binds configuration, the upstream client and the performance
//! log; the modules below hold the request parsing and response shaping for
//! each endpoint family.

pub mod compare;
pub mod constraints;
pub mod csv;
pub mod feedback;
pub mod learner;
pub mod poll;
pub mod relay;
pub mod request;
pub mod submit;
pub mod tracker;

pub use relay::Relay;
pub use request::parse_body;
pub use submit::SubmitRoute;
