use std::any::Any;

use log::debug;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::node::{
    parse_entry, LinkContext, NextField, NodeBehavior, NodeContext, NodeId, NodeKey, Step,
};
use crate::error::LoadError;
use crate::events::DialogEvent;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EventAction {
    pub name: String,
    #[serde(default)]
    pub params: Value,
}

/// Fires host events and writes blackboard variables, then moves on.
///
/// ```json
/// "remember": {
///     "type": "event",
///     "events": [ { "name": "playSound", "params": { "key": "door" } } ],
///     "set": { "talked": true },
///     "next": "bye"
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct EventNode {
    events: Vec<EventAction>,
    set: Map<String, Value>,
    next: Vec<Option<NodeId>>,
}

#[derive(Debug, Deserialize)]
struct EventEntry {
    #[serde(default)]
    events: Vec<EventAction>,
    #[serde(default)]
    set: Map<String, Value>,
    next: Option<NextField>,
}

impl EventNode {
    pub const TYPE: &'static str = "event";

    pub fn from_entry(
        _key: &NodeKey,
        entry: &Value,
        links: &mut LinkContext<'_>,
    ) -> Result<Self, LoadError> {
        let entry: EventEntry = parse_entry(links.owner(), entry)?;
        let ids = entry.next.as_ref().map(NextField::ids).unwrap_or_default();

        Ok(Self {
            events: entry.events,
            set: entry.set,
            next: links.resolve_all(ids)?,
        })
    }

    pub fn events(&self) -> &[EventAction] {
        &self.events
    }

    pub fn assignments(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.set.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl NodeBehavior for EventNode {
    fn type_name(&self) -> &'static str {
        Self::TYPE
    }

    fn successors(&self) -> Vec<Option<NodeId>> {
        self.next.clone()
    }

    fn process(&mut self, cx: &mut NodeContext<'_>) -> Step {
        for (variable, value) in &self.set {
            debug!("'{}' sets {variable} = {value}", cx.key().global_id);
            cx.variables_mut().set(variable.clone(), value.clone());
        }

        for action in &self.events {
            cx.emit(DialogEvent::Custom {
                node: cx.node(),
                name: action.name.clone(),
                params: action.params.clone(),
            });
        }
        Step::Advance
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialog::testing::Harness;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_sets_variables_then_fires_events() {
        let harness = Harness::new(
            json!({
                "root": {
                    "type": "event",
                    "events": [ { "name": "playSound", "params": { "key": "door" } }, { "name": "shake" } ],
                    "set": { "talked": true, "visits": 1 },
                    "next": "check"
                },
                "check": {
                    "type": "condition",
                    "conditions": [ { "next": "again", "talked": { "value": true } } ]
                },
                "again": { "type": "text" }
            }),
            json!({ "again": "Back so soon?" }),
        );
        let mut session = harness.session();
        let mut events = Vec::new();
        session.start(&mut events).unwrap();

        let root = session.graph().root().unwrap();
        assert_eq!(
            events[..2],
            [
                DialogEvent::Custom {
                    node: root,
                    name: "playSound".into(),
                    params: json!({ "key": "door" }),
                },
                DialogEvent::Custom {
                    node: root,
                    name: "shake".into(),
                    params: Value::Null,
                },
            ]
        );
        assert!(matches!(&events[2], DialogEvent::StartTextNode(v) if v.text == "Back so soon?"));
        assert_eq!(session.variables().get("visits"), Some(&json!(1)));
    }

    #[test]
    fn test_event_without_next_ends() {
        let harness = Harness::new(json!({ "root": { "type": "event" } }), json!({}));
        let mut session = harness.session();
        let mut events = Vec::new();
        session.start(&mut events).unwrap();
        assert_eq!(events, vec![DialogEvent::EndNodes]);
        assert!(session.has_ended());
    }
}
