//! Dialog nodes, the reader that builds them and the session that walks them.

mod choice;
mod condition;
mod event;
mod graph;
mod node;
mod reader;
mod session;
mod text;

pub use choice::{ChoiceNode, ChoiceOption};
pub use condition::{ConditionBranch, ConditionNode, Operator, Requirement};
pub use event::{EventAction, EventNode};
pub use graph::DialogGraph;
pub use node::{
    parse_entry, DialogNode, Expect, LinkContext, NextField, NodeBehavior, NodeContext, NodeId,
    NodeKey, Step, TranslateContext,
};
pub use reader::{NodeFactory, NodeReader};
pub use session::{DialogSession, SessionState, MAX_PASS_THROUGH};
pub use text::TextNode;

#[cfg(test)]
pub(crate) mod testing {
    use serde_json::{json, Value};

    use super::{DialogGraph, DialogSession, NodeReader};
    use crate::blackboard::Blackboard;
    use crate::config::{LoadPolicy, ReaderConfig};
    use crate::error::LoadError;
    use crate::localization::JsonLocalization;
    use crate::tracker::RecordingTracker;

    pub const NAMESPACE: &str = "test";

    /// A definition plus the texts and state needed to read it.
    #[derive(Debug, Clone)]
    pub struct Harness {
        pub definition: Value,
        pub localization: JsonLocalization,
        pub variables: Blackboard,
        pub config: ReaderConfig,
    }

    impl Harness {
        /// `texts` becomes the `test` namespace. Speaker `mom` is named
        /// "Mom" and `{{player}}` expands to "Ana".
        pub fn new(definition: Value, texts: Value) -> Self {
            let localization = JsonLocalization::new("en")
                .with_namespace(NAMESPACE, texts)
                .with_namespace("names", json!({ "mom": "Mom" }));
            Self {
                definition,
                localization,
                variables: [("player", "Ana")].into_iter().collect(),
                config: ReaderConfig::default().with_seed(7),
            }
        }

        pub fn permissive(mut self) -> Self {
            self.config.policy = LoadPolicy::Permissive;
            self
        }

        pub fn seeded(mut self, seed: u64) -> Self {
            self.config.shuffle_seed = Some(seed);
            self
        }

        pub fn read(&self) -> Result<DialogGraph, LoadError> {
            NodeReader::with_config(self.config.clone()).read_nodes(
                &self.definition,
                NAMESPACE,
                "",
                &self.localization,
                &self.variables,
            )
        }

        pub fn session(&self) -> DialogSession {
            DialogSession::new(build(self)).with_variables(self.variables.clone())
        }

        pub fn recording_session(&self) -> DialogSession<RecordingTracker> {
            DialogSession::with_tracker(build(self), RecordingTracker::default())
                .with_variables(self.variables.clone())
        }
    }

    pub fn build(harness: &Harness) -> DialogGraph {
        harness.read().expect("test definition should load")
    }
}
