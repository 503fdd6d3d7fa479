//! Session state machine
//!
//! Implements the Elm Architecture pattern with pure state transitions: a user
//! action or collaborator result goes in, a new [`Session`] and a list of
//! [`Effect`]s come out. The runtime performs the effects.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;


pub use effect::Effect;
pub use event::Event;
pub use state::{PendingCall, Session, SessionContext, SessionSnapshot};
pub use transition::{transition, TransitionError};
