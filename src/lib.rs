//! Incremental graph exploration of knowledgebase records.
//!
//! The crate keeps a partially materialized view of a record graph: seed
//! records are placed first, neighbours are pulled in on demand, and a force
//! simulation lays the result out. Everything that renders or persists the
//! view goes through [`controller::GraphController`].

pub mod controller;
pub mod error;
pub mod graph;
pub mod kb;
pub mod options;
pub mod props;
pub mod session;
pub mod sim;
pub mod store;
pub mod util;

pub use controller::{
    ExpandRequest, ExpandSummary, GraphController, HideOutcome, InitOutcome, Notification,
    NotificationLevel, ResolutionOutcome,
};
pub use error::{KbError, StoreError};
pub use graph::{GraphDelta, GraphLink, GraphNode, GraphState};
pub use kb::{KbSchema, KnowledgeBase, Record, RecordCache, RecordLookup, RecordSource, Schema};
pub use options::{GraphOptions, ObjectKind};
pub use props::{PropValues, PropsMap};
pub use sim::{RunHandle, Simulation, SimulationDriver, Viewport};
pub use store::{FileStore, KeyValueStore, MemoryStore};
