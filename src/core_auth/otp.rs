use crate::constants::{OTP_DIGITS, OTP_SECRET_LENGTH};
use colored::Colorize;
use hmac::digest::InvalidLength;
use hmac::{Hmac, Mac};
use log::error;
use rand::RngCore;
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

/// HOTP value (RFC 4226) for `counter`, zero padded to `OTP_DIGITS`.
pub fn hotp(secret: &[u8], counter: u64) -> Result<String, InvalidLength> {
    let mut mac = HmacSha1::new_from_slice(secret)?;
    mac.update(&counter.to_be_bytes());
    let digest = mac.finalize().into_bytes();

    let offset = (digest[digest.len() - 1] & 0x0F) as usize;
    let binary = u32::from_be_bytes([
        digest[offset] & 0x7F,
        digest[offset + 1],
        digest[offset + 2],
        digest[offset + 3],
    ]);
    let code = binary % 10u32.pow(OTP_DIGITS);
    Ok(format!("{:0width$}", code, width = OTP_DIGITS as usize))
}

/// One time password state shared by every connection of a server instance.
///
/// Every check consumes the current counter value, successful or not.
#[derive(Debug)]
pub struct OneTimePassword {
    secret: Vec<u8>,
    counter: u64,
}

impl OneTimePassword {
    pub fn new() -> Self {
        let mut secret = vec![0u8; OTP_SECRET_LENGTH];
        rand::thread_rng().fill_bytes(&mut secret);
        Self::with_secret(secret, 0)
    }

    pub fn with_secret(secret: Vec<u8>, counter: u64) -> Self {
        Self { secret, counter }
    }

    pub fn counter(&self) -> u64 {
        self.counter
    }

    /// Password valid for the current counter value.
    pub fn current(&self) -> Result<String, InvalidLength> {
        hotp(&self.secret, self.counter)
    }

    /// Checks `candidate` against the current password, then advances.
    /// An empty candidate is accepted when `insecure` is set.
    pub fn check(&mut self, candidate: &str, insecure: bool) -> bool {
        let candidate = candidate.trim();
        let success = (insecure && candidate.is_empty())
            || match self.current() {
                Ok(expected) => candidate == expected,
                Err(e) => {
                    error!("Cannot compute one time password: {}", e);
                    false
                }
            };
        self.counter += 1;
        success
    }

    /// Prints the password operators hand out to clients.
    pub fn announce(&self, port: u16) {
        let password = match self.current() {
            Ok(password) => password,
            Err(e) => {
                error!("Cannot compute one time password: {}", e);
                return;
            }
        };
        println!(
            "{} {} {}",
            "++++".cyan(),
            format!("file server on port {}", port).bold(),
            format!("one time password = {}", password).green().bold()
        );
    }
}

impl Default for OneTimePassword {
    fn default() -> Self {
        Self::new()
    }
}
