pub mod schema;
pub mod validation;
pub mod migrate;
pub mod index;
pub mod store;
pub mod cursor;

pub use schema::*;
pub use validation::*;
pub use migrate::LoadWarning;
pub use store::*;
pub use cursor::*;
