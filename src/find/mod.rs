//! Find command handling: trigger disambiguation, the geometry query to the
//! content process, and the observer tying them to the highlight session.

pub mod geometry_query;
pub mod observer;
pub mod trigger_gate;

pub use geometry_query::{GeometryQuery, QueryError, QueryResult};
pub use observer::{FindCommandObserver, ObserverStats};
pub use trigger_gate::{Trigger, TriggerError, TriggerGate};
