use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::{Map, Value};

use super::choice::ChoiceNode;
use super::condition::ConditionNode;
use super::event::EventNode;
use super::graph::DialogGraph;
use super::node::{
    parse_entry, DialogNode, EntryHeader, LinkContext, NodeBehavior, NodeId, NodeKey,
    TranslateContext,
};
use super::text::TextNode;
use crate::blackboard::Blackboard;
use crate::config::ReaderConfig;
use crate::error::LoadError;
use crate::localization::LocalizationProvider;

/// Builds the behavior for one entry of a given `type`.
pub type NodeFactory = Box<
    dyn Fn(&NodeKey, &Value, &mut LinkContext<'_>) -> Result<Box<dyn NodeBehavior>, LoadError>,
>;

/// Reads dialog definitions into [`DialogGraph`]s.
///
/// Node types are looked up in a registry of factories. New types are added
/// with [`NodeReader::register`]; the reading algorithm itself never changes.
pub struct NodeReader {
    constructors: HashMap<String, NodeFactory>,
    config: ReaderConfig,
}

impl fmt::Debug for NodeReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeReader")
            .field("types", &self.types())
            .field("config", &self.config)
            .finish()
    }
}

impl Default for NodeReader {
    fn default() -> Self {
        Self::with_config(ReaderConfig::default())
    }
}

struct Pending<'a> {
    key: NodeKey,
    entry: &'a Value,
    factory: &'a NodeFactory,
    next_delay: Duration,
}

impl NodeReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reader with the built-in `text`, `choice`, `condition` and `event` types.
    pub fn with_config(config: ReaderConfig) -> Self {
        let mut reader = Self {
            constructors: HashMap::new(),
            config,
        };
        reader
            .register_behavior(TextNode::TYPE, TextNode::from_entry)
            .register_behavior(ChoiceNode::TYPE, ChoiceNode::from_entry)
            .register_behavior(ConditionNode::TYPE, ConditionNode::from_entry)
            .register_behavior(EventNode::TYPE, EventNode::from_entry);
        reader
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    /// Register (or replace) the factory for `type_name`.
    pub fn register<F>(&mut self, type_name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&NodeKey, &Value, &mut LinkContext<'_>) -> Result<Box<dyn NodeBehavior>, LoadError>
            + 'static,
    {
        let type_name = type_name.into();
        if self
            .constructors
            .insert(type_name.clone(), Box::new(factory))
            .is_some()
        {
            debug!("Replaced factory for node type '{type_name}'");
        }
        self
    }

    /// Register a constructor returning a concrete behavior.
    pub fn register_behavior<T, F>(&mut self, type_name: impl Into<String>, build: F) -> &mut Self
    where
        T: NodeBehavior + 'static,
        F: Fn(&NodeKey, &Value, &mut LinkContext<'_>) -> Result<T, LoadError> + 'static,
    {
        self.register(
            type_name,
            move |key: &NodeKey, entry: &Value, links: &mut LinkContext<'_>| {
                let node = build(key, entry, links)?;
                Ok(Box::new(node) as Box<dyn NodeBehavior>)
            },
        )
    }

    pub fn knows(&self, type_name: &str) -> bool {
        self.constructors.contains_key(type_name)
    }

    pub fn types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    /// Build the graph for `definition`, or for `definition[object_name]`
    /// when `object_name` is not empty.
    ///
    /// Localized content is resolved from `namespace` while nodes are built.
    pub fn read_nodes(
        &self,
        definition: &Value,
        namespace: &str,
        object_name: &str,
        localization: &dyn LocalizationProvider,
        variables: &Blackboard,
    ) -> Result<DialogGraph, LoadError> {
        let scope = if object_name.is_empty() {
            namespace
        } else {
            object_name
        };
        let selected = if object_name.is_empty() {
            definition
        } else {
            definition
                .get(object_name)
                .ok_or_else(|| LoadError::MissingObject(object_name.to_string()))?
        };
        let entries = selected
            .as_object()
            .ok_or_else(|| LoadError::NotAnObject(scope.to_string()))?;

        // Ids are fixed before anything is built, so successors resolve
        // straight to indices.
        let pending = self.collect(entries, namespace, object_name)?;
        let index: HashMap<String, NodeId> = pending
            .iter()
            .enumerate()
            .map(|(i, p)| (p.key.id.clone(), NodeId::new(i)))
            .collect();

        let mut rng = match self.config.shuffle_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let policy = self.config.policy;

        let mut nodes = Vec::with_capacity(pending.len());
        for p in &pending {
            let mut links = LinkContext {
                owner: &p.key.id,
                index: &index,
                policy,
            };
            let mut behavior = (p.factory)(&p.key, p.entry, &mut links)?;

            let mut cx = TranslateContext {
                namespace,
                names_namespace: &self.config.names_namespace,
                localization,
                variables,
                rng: &mut rng,
                policy,
            };
            behavior.translate(&p.key, &mut cx)?;

            debug!(
                "Built {} node '{}' -> {:?}",
                behavior.type_name(),
                p.key.global_id,
                behavior.successors()
            );
            nodes.push(DialogNode::new(p.key.clone(), p.next_delay, behavior));
        }

        let root = index.get("root").copied();
        if root.is_none() {
            if policy.is_strict() {
                return Err(LoadError::MissingRoot(scope.to_string()));
            }
            warn!("No 'root' node in '{scope}'");
        }

        info!("Read {} dialog nodes from '{scope}' ({namespace})", nodes.len());
        Ok(DialogGraph::new(namespace.to_string(), nodes, root))
    }

    /// Pick the entries that will become nodes, in definition order.
    ///
    /// Ids are map keys, so a definition cannot hold the same id twice. A
    /// repeated key in the source JSON has already collapsed into its last
    /// value when it was parsed.
    fn collect<'a>(
        &'a self,
        entries: &'a Map<String, Value>,
        namespace: &str,
        object_name: &str,
    ) -> Result<Vec<Pending<'a>>, LoadError> {
        let strict = self.config.policy.is_strict();
        let mut pending = Vec::with_capacity(entries.len());

        for (id, entry) in entries {
            let key = NodeKey::new(namespace, object_name, id);

            let header: EntryHeader = match parse_entry(id, entry) {
                Ok(header) => header,
                Err(e) if !strict => {
                    warn!("Skipping '{}': {e}", key.global_id);
                    continue;
                }
                Err(e) => return Err(e),
            };

            let kind = header.kind.unwrap_or_default();
            let Some(factory) = self.constructors.get(&kind) else {
                if strict {
                    return Err(LoadError::UnknownType {
                        id: id.clone(),
                        kind,
                    });
                }
                warn!("Skipping '{}' with unknown type '{kind}'", key.global_id);
                continue;
            };

            pending.push(Pending {
                key,
                entry,
                factory,
                next_delay: header.next_delay.unwrap_or_default(),
            });
        }

        Ok(pending)
    }
}
