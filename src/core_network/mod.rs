pub mod framing;
pub mod handshake;
pub mod idle;
pub mod network;
pub mod transfer;

#[cfg(test)]
mod test_network;
