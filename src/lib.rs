//! Data-driven dialog graphs for narrative games.
//!
//! A JSON definition maps node ids to entries such as
//! `{ "type": "text", "character": "mom", "next": "ask" }`. The
//! [`NodeReader`] turns it into a [`DialogGraph`], pulling display text from a
//! [`LocalizationProvider`]. A [`DialogSession`] then walks the graph: it emits
//! [`DialogEvent`]s for the presentation layer and waits for
//! [`DialogInput`]s coming back.
//!
//! ```no_run
//! use dialog_graph::{Blackboard, DialogInput, DialogSession, JsonLocalization, NodeReader};
//! use serde_json::json;
//!
//! let definition = json!({ "root": { "type": "text", "character": "mom" } });
//! let localization = JsonLocalization::new("en")
//!     .with_namespace("intro", json!({ "root": "Dinner's ready." }));
//!
//! let graph = NodeReader::new()
//!     .read_nodes(&definition, "intro", "", &localization, &Blackboard::new())
//!     .unwrap();
//!
//! let mut events = Vec::new();
//! let mut session = DialogSession::new(graph);
//! session.start(&mut events).unwrap();
//! session.resume(DialogInput::NextDialog, &mut events).unwrap();
//! assert!(session.has_ended());
//! ```

pub mod blackboard;
pub mod config;
pub mod dialog;
pub mod error;
pub mod events;
pub mod localization;
pub mod tracker;

pub use blackboard::Blackboard;
pub use config::{LoadPolicy, ReaderConfig};
pub use dialog::{
    ChoiceNode, ConditionNode, DialogGraph, DialogNode, DialogSession, EventNode, NodeBehavior,
    NodeId, NodeReader, SessionState, TextNode,
};
pub use error::{LoadError, LocalizationError, SessionError};
pub use events::{DialogEvent, DialogInput, EventBus, EventDispatcher};
pub use localization::{JsonLocalization, LocalizationProvider, Translation};
pub use tracker::{LogTracker, NoopTracker, RecordingTracker, Tracker};
