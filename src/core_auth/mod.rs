pub mod authenticate;
pub mod otp;

pub use otp::OneTimePassword;
