//! Venue credential management.
//!
//! This crate holds the identity a gateway presents to the venue when it
//! authenticates and logs in.
//!
//! # Features
//!
//! - **Secure Credentials**: the password and authentication code are wrapped in
//!   `SecretString` to prevent accidental logging and ensure memory is zeroed on drop.
//! - **Environment Loading**: credentials can be loaded from environment variables
//!   or a `.env` file.
//!
//! # Example
//!
//! ```rust,ignore
//! use auth::VenueCredentials;
//!
//! let credentials = VenueCredentials::from_env()?;
//! println!("logging in as {}@{}", credentials.user_id(), credentials.broker_id());
//! ```

mod credentials;
mod error;

pub use credentials::VenueCredentials;
pub use error::AuthError;
