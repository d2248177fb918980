//! # Joinery
//!
//! A dependency-resolution container: declare what a type needs, and the
//! container builds the whole object graph.
//!
//! ```rust
//! use joinery::prelude::*;
//! use std::sync::Arc;
//!
//! #[derive(Component)]
//! struct Database {
//!     database_url: String,
//! }
//!
//! #[derive(Component)]
//! struct Orders {
//!     database: Arc<Database>,
//!     #[component(default = 30u64)]
//!     timeout_secs: u64,
//! }
//!
//! let di = Di::builder()
//!     .binding("database_url", String::from("postgres://localhost/shop"))
//!     .class::<Database>()
//!     .build();
//!
//! let orders = di.build_class::<Orders>().unwrap();
//! assert_eq!(orders.database.database_url, "postgres://localhost/shop");
//! assert_eq!(orders.timeout_secs, 30);
//! ```

pub use joinery_container::*;
pub use joinery_derive::*;
pub use joinery_support::*;

/// `use joinery::prelude::*` for the container and the derive.
pub mod prelude {
    pub use joinery_container::prelude::*;
    pub use joinery_derive::*;
}
