// Scoring domain and orchestration
pub mod keywords {
    pub use crate::keywords::*;
}

pub mod scoring {
    pub use crate::scoring::*;
}

pub mod models {
    pub use crate::models::*;
}

pub mod services {
    pub use crate::services::*;
}
