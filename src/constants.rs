// src/constants.rs

pub const DEFAULT_PORT: u16 = 8081;
pub const MAX_RETRY_PORT: u16 = 32767;

pub const LOCALHOST: &str = "127.0.0.1";
pub const ALL_INTERFACES: &str = "0.0.0.0";

/// Appended to `Sec-WebSocket-Key` before hashing (RFC 6455 section 1.3).
pub const WEBSOCKET_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";
pub const MAX_HANDSHAKE_BYTES: usize = 8 * 1024;

pub const MAX_FRAME_SIZE: usize = 512 * 1024 * 1024;
/// Ceiling for password and command frames on control sockets.
pub const MAX_CONTROL_FRAME_SIZE: usize = 1024 * 1024;

pub const OTP_DIGITS: u32 = 6;
pub const OTP_SECRET_LENGTH: usize = 20;

pub const UPLOAD_IDLE_TIMEOUT_MS: u64 = 2000;
pub const TRANSFER_ACCEPT_TIMEOUT_SECS: u64 = 30;
/// Upper bound on what an upload reserves before its first chunk arrives.
pub const UPLOAD_INITIAL_RESERVE_PACKETS: usize = 4;

pub const TERMINATE_GRACE_MS: u64 = 500;

/// Base directories shallower than this many path components are refused.
pub const MIN_DIRECTORY_DEPTH: usize = 3;

pub const DEFAULT_DICOM_CONVERTER: &str = "dcm2niix";
