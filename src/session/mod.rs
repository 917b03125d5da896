//! Control-channel session layer
//!
//! A text request/response protocol over TCP negotiates the media session:
//! SETUP advertises the receiver's datagram port, PLAY and PAUSE gate the
//! data path, TEARDOWN ends the session. Both ends track the same state
//! machine and simply ignore requests that do not fit the current state.

pub mod client;
pub mod message;
pub mod server;

pub use client::ControlClient;
pub use message::{Method, Request, Response};
pub use server::{ControlServer, ServerEvent};

/// Session states on both ends of the control channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No session negotiated yet
    Init,
    /// Session set up, data path idle
    Ready,
    /// Data path active
    Playing,
}

impl SessionState {
    /// Whether `method` is acceptable in this state.
    ///
    /// TEARDOWN is always accepted; everything else requires its exact
    /// predecessor state.
    pub fn accepts(&self, method: message::Method) -> bool {
        use message::Method::*;

        matches!(
            (self, method),
            (SessionState::Init, Setup)
                | (SessionState::Ready, Play)
                | (SessionState::Playing, Pause)
                | (_, Teardown)
        )
    }

    /// The state reached by applying `method`, assuming it was accepted.
    pub fn after(&self, method: message::Method) -> SessionState {
        use message::Method::*;

        match method {
            Setup => SessionState::Ready,
            Play => SessionState::Playing,
            Pause => SessionState::Ready,
            Teardown => SessionState::Init,
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Init => write!(f, "INIT"),
            SessionState::Ready => write!(f, "READY"),
            SessionState::Playing => write!(f, "PLAYING"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use message::Method;

    #[test]
    fn test_legal_transitions() {
        assert!(SessionState::Init.accepts(Method::Setup));
        assert!(SessionState::Ready.accepts(Method::Play));
        assert!(SessionState::Playing.accepts(Method::Pause));

        assert_eq!(SessionState::Init.after(Method::Setup), SessionState::Ready);
        assert_eq!(
            SessionState::Ready.after(Method::Play),
            SessionState::Playing
        );
        assert_eq!(
            SessionState::Playing.after(Method::Pause),
            SessionState::Ready
        );
    }

    #[test]
    fn test_illegal_transitions_rejected() {
        assert!(!SessionState::Init.accepts(Method::Play));
        assert!(!SessionState::Init.accepts(Method::Pause));
        assert!(!SessionState::Ready.accepts(Method::Setup));
        assert!(!SessionState::Ready.accepts(Method::Pause));
        assert!(!SessionState::Playing.accepts(Method::Setup));
        assert!(!SessionState::Playing.accepts(Method::Play));
    }

    #[test]
    fn test_teardown_always_accepted() {
        for state in [SessionState::Init, SessionState::Ready, SessionState::Playing] {
            assert!(state.accepts(Method::Teardown));
            assert_eq!(state.after(Method::Teardown), SessionState::Init);
        }
    }
}
