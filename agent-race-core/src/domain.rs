pub mod event;
pub mod ids;
pub mod participant;
pub mod race;
pub mod task;

pub use event::*;
pub use ids::*;
pub use participant::*;
pub use race::*;
pub use task::*;
