//! Scenario store adapters.
//!
//! - `memory` - `RwLock`-guarded vectors, for demos and tests
//! - `sqlite` - durable store on a single SQLite file
//! - `scenario_file` - JSON scenario documents imported into an empty store

mod memory;
mod scenario_file;
mod sqlite;

pub use memory::InMemoryStore;
pub use scenario_file::Scenario;
pub use sqlite::SqliteStore;
