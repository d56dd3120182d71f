use std::collections::HashMap;
use std::fmt;

use log::trace;
use serde_json::Value;

use crate::dialog::NodeId;

/// Event names shared with the presentation layer.
pub mod names {
    pub const START_TEXT_NODE: &str = "startTextNode";
    pub const UPDATE_TEXT_NODE: &str = "updateTextNode";
    pub const NEXT_DIALOG: &str = "nextDialog";

    pub const START_CHOICE_NODE: &str = "startChoiceNode";
    pub const SELECT_CHOICE_NODE: &str = "selectChoiceNode";

    pub const END_NODES: &str = "endNodes";
    pub const CLEAR_NODES: &str = "clearNodes";

    /// Subscribing under this name receives every event.
    pub const ANY: &str = "*";
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// What the presentation layer needs to show one text fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextView {
    pub node: NodeId,
    pub character: Option<String>,
    /// Localized speaker name.
    pub name: String,
    pub text: String,
    pub fragment: usize,
    pub fragments: usize,
    pub centered: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceView {
    pub node: NodeId,
    pub choices: Vec<String>,
}

/// Events emitted by a dialog session.
#[derive(Debug, Clone, PartialEq)]
pub enum DialogEvent {
    StartTextNode(TextView),
    UpdateTextNode(TextView),
    StartChoiceNode(ChoiceView),
    /// Fired by event nodes under their own name.
    Custom {
        node: NodeId,
        name: String,
        params: Value,
    },
    EndNodes,
    ClearNodes,
}

impl DialogEvent {
    pub fn name(&self) -> &str {
        match self {
            DialogEvent::StartTextNode(_) => names::START_TEXT_NODE,
            DialogEvent::UpdateTextNode(_) => names::UPDATE_TEXT_NODE,
            DialogEvent::StartChoiceNode(_) => names::START_CHOICE_NODE,
            DialogEvent::Custom { name, .. } => name.as_str(),
            DialogEvent::EndNodes => names::END_NODES,
            DialogEvent::ClearNodes => names::CLEAR_NODES,
        }
    }
}

/// Input coming back from the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogInput {
    NextDialog,
    /// Zero-based index into the choices last shown.
    SelectChoice(usize),
}

impl DialogInput {
    pub fn name(&self) -> &'static str {
        match self {
            DialogInput::NextDialog => names::NEXT_DIALOG,
            DialogInput::SelectChoice(_) => names::SELECT_CHOICE_NODE,
        }
    }
}

// ---------------------------------------------------------------------------
// Bus
// ---------------------------------------------------------------------------

pub trait EventBus {
    fn dispatch(&mut self, event: DialogEvent);
}

/// Records every event in order.
impl EventBus for Vec<DialogEvent> {
    fn dispatch(&mut self, event: DialogEvent) {
        self.push(event);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OwnerId(u64);

struct Listener {
    owner: OwnerId,
    once: bool,
    handler: Box<dyn FnMut(&DialogEvent)>,
}

/// Publish/subscribe channel keyed by event name.
#[derive(Default)]
pub struct EventDispatcher {
    listeners: HashMap<String, Vec<Listener>>,
    next_owner: u64,
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: HashMap<&str, usize> = self
            .listeners
            .iter()
            .map(|(name, list)| (name.as_str(), list.len()))
            .collect();
        f.debug_struct("EventDispatcher")
            .field("listeners", &counts)
            .finish()
    }
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an identity to group subscriptions under.
    pub fn owner(&mut self) -> OwnerId {
        self.next_owner += 1;
        OwnerId(self.next_owner)
    }

    pub fn subscribe(
        &mut self,
        name: &str,
        owner: OwnerId,
        handler: impl FnMut(&DialogEvent) + 'static,
    ) {
        self.add(name, owner, false, Box::new(handler));
    }

    /// The handler is dropped after its first call.
    pub fn subscribe_once(
        &mut self,
        name: &str,
        owner: OwnerId,
        handler: impl FnMut(&DialogEvent) + 'static,
    ) {
        self.add(name, owner, true, Box::new(handler));
    }

    fn add(
        &mut self,
        name: &str,
        owner: OwnerId,
        once: bool,
        handler: Box<dyn FnMut(&DialogEvent)>,
    ) {
        self.listeners
            .entry(name.to_string())
            .or_default()
            .push(Listener {
                owner,
                once,
                handler,
            });
    }

    /// Drop every subscription held by `owner`. Returns how many were removed.
    pub fn unsubscribe_all(&mut self, owner: OwnerId) -> usize {
        let mut removed = 0;
        for list in self.listeners.values_mut() {
            let before = list.len();
            list.retain(|l| l.owner != owner);
            removed += before - list.len();
        }
        self.listeners.retain(|_, list| !list.is_empty());
        removed
    }

    pub fn listener_count(&self, name: &str) -> usize {
        self.listeners.get(name).map_or(0, Vec::len)
    }

    fn notify(&mut self, key: &str, event: &DialogEvent) {
        if let Some(list) = self.listeners.get_mut(key) {
            for listener in list.iter_mut() {
                (listener.handler)(event);
            }
            list.retain(|l| !l.once);
        }
    }
}

impl EventBus for EventDispatcher {
    fn dispatch(&mut self, event: DialogEvent) {
        trace!("dispatch {}", event.name());
        let name = event.name().to_string();
        self.notify(&name, &event);
        if name != names::ANY {
            self.notify(names::ANY, &event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn counter() -> (Rc<RefCell<Vec<String>>>, impl FnMut(&DialogEvent) + 'static) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        (seen, move |e: &DialogEvent| {
            sink.borrow_mut().push(e.name().to_string())
        })
    }

    #[test]
    fn test_dispatch_by_name() {
        let mut bus = EventDispatcher::new();
        let owner = bus.owner();
        let (seen, handler) = counter();
        bus.subscribe(names::END_NODES, owner, handler);

        bus.dispatch(DialogEvent::ClearNodes);
        bus.dispatch(DialogEvent::EndNodes);

        assert_eq!(*seen.borrow(), vec!["endNodes".to_string()]);
    }

    #[test]
    fn test_subscribe_once() {
        let mut bus = EventDispatcher::new();
        let owner = bus.owner();
        let (seen, handler) = counter();
        bus.subscribe_once(names::END_NODES, owner, handler);

        bus.dispatch(DialogEvent::EndNodes);
        bus.dispatch(DialogEvent::EndNodes);

        assert_eq!(seen.borrow().len(), 1);
        assert_eq!(bus.listener_count(names::END_NODES), 0);
    }

    #[test]
    fn test_wildcard_and_custom_names() {
        let mut bus = EventDispatcher::new();
        let owner = bus.owner();
        let (seen, handler) = counter();
        bus.subscribe(names::ANY, owner, handler);

        bus.dispatch(DialogEvent::Custom {
            node: NodeId::new(0),
            name: "playSound".into(),
            params: Value::Null,
        });
        bus.dispatch(DialogEvent::EndNodes);

        assert_eq!(
            *seen.borrow(),
            vec!["playSound".to_string(), "endNodes".to_string()]
        );
    }

    #[test]
    fn test_unsubscribe_all_only_touches_owner() {
        let mut bus = EventDispatcher::new();
        let scene = bus.owner();
        let hud = bus.owner();
        let (scene_seen, h1) = counter();
        let (_, h2) = counter();
        let (hud_seen, h3) = counter();
        bus.subscribe(names::END_NODES, scene, h1);
        bus.subscribe(names::CLEAR_NODES, scene, h2);
        bus.subscribe(names::END_NODES, hud, h3);

        assert_eq!(bus.unsubscribe_all(scene), 2);
        bus.dispatch(DialogEvent::EndNodes);

        assert!(scene_seen.borrow().is_empty());
        assert_eq!(hud_seen.borrow().len(), 1);
        assert_eq!(bus.listener_count(names::CLEAR_NODES), 0);
    }
}
