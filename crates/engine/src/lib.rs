//! Macrosim Engine library.
//!
//! Replays a scripted macro-economic scenario at a compressed time rate,
//! evolving the macro state as releases and events fire and narrating each
//! moment.
//!
//! ## Structure
//!
//! - `entities/` - Entity modules wrapping store operations
//! - `use_cases/` - Playback loop, scenario import and narrative generation
//! - `infrastructure/` - External dependency implementations (ports + adapters)
//! - `app` - Application composition

pub mod app;
pub mod entities;
pub mod infrastructure;
pub mod use_cases;

pub use app::App;
