//! Domain module
//!
//! Value types shared by the ledger, handlers and API.

pub mod amount;
pub mod currency;
pub mod secret;

pub use amount::{Amount, AmountError};
pub use currency::{Currency, UnsupportedCurrency};
pub use secret::{random_secret_code, SECRET_CODE_LEN};
