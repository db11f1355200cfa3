//! External service integrations.

pub mod judge {
    pub use crate::judge::*;
}

pub mod extraction {
    pub use crate::extraction::*;
}

pub mod db_storage {
    pub use crate::db_storage::*;
}
