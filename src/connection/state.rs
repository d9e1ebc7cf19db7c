//! Connection state machine

/// Connection state
///
/// A connection is `Opened` exactly while it holds a session. Replacing a
/// failed session keeps it `Opened`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Holding a session
    Opened,

    /// Holding no session (initial and terminal state)
    Closed,
}

impl ConnectionState {
    pub(crate) fn from_open(open: bool) -> Self {
        if open {
            ConnectionState::Opened
        } else {
            ConnectionState::Closed
        }
    }

    /// Whether requests can be sent in this state
    pub fn is_open(&self) -> bool {
        matches!(self, ConnectionState::Opened)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Opened => write!(f, "opened"),
            Self::Closed => write!(f, "closed"),
        }
    }
}
