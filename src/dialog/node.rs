use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use log::warn;
use rand::rngs::StdRng;
use serde::de::{self, DeserializeOwned};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::blackboard::Blackboard;
use crate::config::LoadPolicy;
use crate::error::{LoadError, SessionError};
use crate::events::{DialogEvent, DialogInput, EventBus};
use crate::localization::LocalizationProvider;
use crate::tracker::Tracker;

/// Index of a node inside its [`DialogGraph`](super::DialogGraph).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The three names a node is known by.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeKey {
    /// Key inside the defining object.
    pub id: String,
    /// `object.id`, or just `id` at top level. Used for translations.
    pub full_id: String,
    /// `namespace.full_id`, unique across a loaded definition.
    pub global_id: String,
}

impl NodeKey {
    pub fn new(namespace: &str, object_name: &str, id: &str) -> Self {
        let full_id = if object_name.is_empty() {
            id.to_string()
        } else {
            format!("{object_name}.{id}")
        };
        let global_id = format!("{namespace}.{full_id}");
        Self {
            id: id.to_string(),
            full_id,
            global_id,
        }
    }
}

// ---------------------------------------------------------------------------
// Behavior contract
// ---------------------------------------------------------------------------

/// Input a node is suspended on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expect {
    NextDialog,
    SelectChoice,
}

impl Expect {
    pub fn accepts(self, input: &DialogInput) -> bool {
        matches!(
            (self, input),
            (Expect::NextDialog, DialogInput::NextDialog)
                | (Expect::SelectChoice, DialogInput::SelectChoice(_))
        )
    }
}

/// What a node wants the session to do after it ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Suspend until the presentation layer answers.
    Await(Expect),
    /// Move on to `next[next_index]`.
    Advance,
}

/// Per-variant behavior of a dialog node.
///
/// New node types implement this and register a factory with
/// [`NodeReader::register`](super::NodeReader::register).
pub trait NodeBehavior: fmt::Debug {
    fn type_name(&self) -> &'static str;

    /// Successor slots in branch order. `None` marks an unresolved id.
    fn successors(&self) -> Vec<Option<NodeId>>;

    /// Branch picked by the last run of the node.
    fn next_index(&self) -> usize {
        0
    }

    /// Resolve localized content. Called once, right after construction.
    fn translate(&mut self, _key: &NodeKey, _cx: &mut TranslateContext<'_>) -> Result<(), LoadError> {
        Ok(())
    }

    /// Begin the node's interactive phase.
    fn process(&mut self, cx: &mut NodeContext<'_>) -> Step;

    /// Answer to a previous [`Step::Await`].
    fn resume(
        &mut self,
        input: DialogInput,
        cx: &mut NodeContext<'_>,
    ) -> Result<Step, SessionError> {
        Err(SessionError::UnexpectedInput {
            node: cx.key().global_id.clone(),
            input: input.name(),
        })
    }

    /// Runs once `next_delay` has elapsed after advancing through branch `index`.
    fn after_advance(&mut self, _index: usize) {}

    fn as_any(&self) -> &dyn Any;
}

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct DialogNode {
    pub(crate) key: NodeKey,
    pub(crate) next_delay: Duration,
    pub(crate) behavior: Box<dyn NodeBehavior>,
}

impl DialogNode {
    pub fn new(key: NodeKey, next_delay: Duration, behavior: Box<dyn NodeBehavior>) -> Self {
        Self {
            key,
            next_delay,
            behavior,
        }
    }

    pub fn key(&self) -> &NodeKey {
        &self.key
    }

    pub fn id(&self) -> &str {
        &self.key.id
    }

    pub fn full_id(&self) -> &str {
        &self.key.full_id
    }

    pub fn global_id(&self) -> &str {
        &self.key.global_id
    }

    pub fn type_name(&self) -> &'static str {
        self.behavior.type_name()
    }

    pub fn next(&self) -> Vec<Option<NodeId>> {
        self.behavior.successors()
    }

    pub fn next_index(&self) -> usize {
        self.behavior.next_index()
    }

    /// `next[next_index]`, or `None` when out of range or unresolved.
    pub fn successor(&self) -> Option<NodeId> {
        self.next().get(self.next_index()).copied().flatten()
    }

    pub fn next_delay(&self) -> Duration {
        self.next_delay
    }

    pub fn behavior(&self) -> &dyn NodeBehavior {
        self.behavior.as_ref()
    }

    pub fn downcast_ref<T: NodeBehavior + 'static>(&self) -> Option<&T> {
        self.behavior.as_any().downcast_ref::<T>()
    }
}

// ---------------------------------------------------------------------------
// Contexts handed to behaviors
// ---------------------------------------------------------------------------

/// Resolves successor ids while a node is being built.
pub struct LinkContext<'a> {
    pub(crate) owner: &'a str,
    pub(crate) index: &'a HashMap<String, NodeId>,
    pub(crate) policy: LoadPolicy,
}

impl LinkContext<'_> {
    /// Id of the node being built.
    pub fn owner(&self) -> &str {
        self.owner
    }

    pub fn resolve(&self, target: &str) -> Result<Option<NodeId>, LoadError> {
        if let Some(id) = self.index.get(target) {
            return Ok(Some(*id));
        }
        if self.policy.is_strict() {
            return Err(LoadError::DanglingSuccessor {
                id: self.owner.to_string(),
                target: target.to_string(),
            });
        }
        warn!("Node '{}' points to missing node '{target}'", self.owner);
        Ok(None)
    }

    pub fn resolve_all<'s>(
        &self,
        targets: impl IntoIterator<Item = &'s str>,
    ) -> Result<Vec<Option<NodeId>>, LoadError> {
        targets.into_iter().map(|t| self.resolve(t)).collect()
    }
}

pub struct TranslateContext<'a> {
    pub(crate) namespace: &'a str,
    pub(crate) names_namespace: &'a str,
    pub(crate) localization: &'a dyn LocalizationProvider,
    pub(crate) variables: &'a Blackboard,
    pub(crate) rng: &'a mut StdRng,
    pub(crate) policy: LoadPolicy,
}

impl TranslateContext<'_> {
    pub fn namespace(&self) -> &str {
        self.namespace
    }

    pub fn policy(&self) -> LoadPolicy {
        self.policy
    }

    pub fn rng(&mut self) -> &mut StdRng {
        &mut *self.rng
    }

    /// Ordered, placeholder-expanded texts stored under `key`.
    pub fn fragments(&self, key: &str) -> Vec<String> {
        self.localization
            .translate_list(key, self.namespace)
            .iter()
            .map(|text| self.localization.expand(text, self.variables))
            .collect()
    }

    pub fn speaker_name(&self, character: &str) -> Option<String> {
        self.localization
            .translate(character, self.names_namespace)
            .map(|name| self.localization.expand(&name, self.variables))
    }
}

/// Everything a node may touch while it runs.
pub struct NodeContext<'a> {
    pub(crate) node: NodeId,
    pub(crate) key: &'a NodeKey,
    pub(crate) events: &'a mut dyn EventBus,
    pub(crate) tracker: &'a mut dyn Tracker,
    pub(crate) variables: &'a mut Blackboard,
}

impl NodeContext<'_> {
    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn key(&self) -> &NodeKey {
        self.key
    }

    pub fn emit(&mut self, event: DialogEvent) {
        self.events.dispatch(event);
    }

    pub fn tracker(&mut self) -> &mut dyn Tracker {
        &mut *self.tracker
    }

    pub fn variables(&self) -> &Blackboard {
        &*self.variables
    }

    pub fn variables_mut(&mut self) -> &mut Blackboard {
        &mut *self.variables
    }
}

// ---------------------------------------------------------------------------
// Entry parsing helpers
// ---------------------------------------------------------------------------

/// Fields every entry shares.
#[derive(Debug, Deserialize)]
pub(crate) struct EntryHeader {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    #[serde(rename = "nextDelay", default, deserialize_with = "delay_millis")]
    pub next_delay: Option<Duration>,
}

/// `nextDelay` in milliseconds, fractions allowed.
fn delay_millis<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(ms) = Option::<f64>::deserialize(deserializer)? else {
        return Ok(None);
    };
    if !ms.is_finite() || ms < 0.0 {
        return Err(de::Error::custom(format!(
            "nextDelay must be a non-negative number of milliseconds, got {ms}"
        )));
    }
    Ok(Some(Duration::from_micros((ms * 1000.0).round() as u64)))
}

/// `next` given as a single id or a list of ids.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum NextField {
    One(String),
    Many(Vec<String>),
}

impl NextField {
    /// Ids in order, skipping empty strings.
    pub fn ids(&self) -> Vec<&str> {
        let ids: Vec<&str> = match self {
            NextField::One(id) => vec![id.as_str()],
            NextField::Many(ids) => ids.iter().map(String::as_str).collect(),
        };
        ids.into_iter().filter(|id| !id.is_empty()).collect()
    }
}

/// Deserialize a variant-specific entry, tagging errors with the node id.
pub fn parse_entry<T: DeserializeOwned>(id: &str, entry: &Value) -> Result<T, LoadError> {
    T::deserialize(entry).map_err(|source| LoadError::Malformed {
        id: id.to_string(),
        source,
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BoolOrText {
    Bool(bool),
    Text(String),
}

// Authoring files carry both `true` and `"true"`.
fn flag<E: de::Error>(raw: BoolOrText) -> Result<bool, E> {
    match raw {
        BoolOrText::Bool(b) => Ok(b),
        BoolOrText::Text(s) => match s.trim() {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(E::custom(format!("expected a boolean, got '{other}'"))),
        },
    }
}

pub(crate) fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    flag(BoolOrText::deserialize(deserializer)?)
}

pub(crate) fn lenient_opt_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<BoolOrText>::deserialize(deserializer)?
        .map(flag)
        .transpose()
}
