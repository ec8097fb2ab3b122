//! Storage backends and fallback routing.

pub mod store {
    pub use crate::store::*;
}

pub mod memory_store {
    pub use crate::memory_store::*;
}

pub mod db_storage {
    pub use crate::db_storage::*;
}

pub mod fallback {
    pub use crate::fallback::*;
}

pub mod health {
    pub use crate::health::*;
}
