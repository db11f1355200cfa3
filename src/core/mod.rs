// Domain-layer modules and shared errors/models
pub mod evaluation {
    pub use crate::evaluation::*;
}

pub mod models {
    pub use crate::models::*;
}

pub mod prompt {
    pub use crate::prompt::*;
}

pub mod services {
    pub use crate::services::*;
}

pub mod errors {
    pub use crate::errors::*;
}
