use std::net::SocketAddr;

/// Protocol state of one socket. Transitions only move forward; a failed
/// password keeps the connection in `AwaitingAuth`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    AwaitingHandshake,
    AwaitingAuth,
    Dispatching,
    Terminated,
}

#[derive(Debug)]
pub struct Session {
    pub peer: SocketAddr,
    pub port: u16,
    pub is_data_transfer: bool,
    state: ConnectionState,
}

impl Session {
    pub fn new(peer: SocketAddr, port: u16, is_data_transfer: bool) -> Self {
        Self {
            peer,
            port,
            is_data_transfer,
            state: ConnectionState::AwaitingHandshake,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// True while commands (or upload chunks) may be processed.
    pub fn is_dispatching(&self) -> bool {
        self.state == ConnectionState::Dispatching
    }

    /// Data-transfer sockets skip authentication and go straight to dispatch.
    pub fn complete_handshake(&mut self) {
        if self.state == ConnectionState::AwaitingHandshake {
            self.state = if self.is_data_transfer {
                ConnectionState::Dispatching
            } else {
                ConnectionState::AwaitingAuth
            };
        }
    }

    pub fn authenticate(&mut self) {
        if self.state == ConnectionState::AwaitingAuth {
            self.state = ConnectionState::Dispatching;
        }
    }

    pub fn terminate(&mut self) {
        self.state = ConnectionState::Terminated;
    }
}
