//! External service integrations.

pub mod verida_client {
    pub use crate::verida_client::*;
}

pub mod verida_token {
    pub use crate::verida_token::*;
}

pub mod source_models {
    pub use crate::source_models::*;
}
