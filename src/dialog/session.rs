use std::time::Duration;

use log::{debug, info, warn};

use super::graph::DialogGraph;
use super::node::{Expect, NodeContext, NodeId, Step};
use crate::blackboard::Blackboard;
use crate::error::SessionError;
use crate::events::{DialogEvent, DialogInput, EventBus};
use crate::tracker::{NoopTracker, Tracker};

/// Consecutive nodes allowed to advance without waiting for input.
pub const MAX_PASS_THROUGH: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Not started, or restarted.
    Idle,
    /// Suspended on a node until the presentation layer answers.
    Awaiting { node: NodeId, input: Expect },
    /// Leaving `from` through branch `index` once `remaining` has elapsed.
    Delayed {
        from: NodeId,
        index: usize,
        target: Option<NodeId>,
        remaining: Duration,
    },
    Ended,
}

enum Transition {
    Continue(Option<NodeId>),
    Wait,
}

/// Drives one traversal of a [`DialogGraph`].
///
/// The session never blocks. It runs nodes until one waits for input or a
/// delay, and the host calls back with [`resume`](Self::resume) or
/// [`update`](Self::update).
#[derive(Debug)]
pub struct DialogSession<T: Tracker = NoopTracker> {
    graph: DialogGraph,
    state: SessionState,
    variables: Blackboard,
    tracker: T,
    history: Vec<NodeId>,
}

impl DialogSession<NoopTracker> {
    pub fn new(graph: DialogGraph) -> Self {
        Self::with_tracker(graph, NoopTracker)
    }
}

impl<T: Tracker> DialogSession<T> {
    pub fn with_tracker(graph: DialogGraph, tracker: T) -> Self {
        Self {
            graph,
            state: SessionState::Idle,
            variables: Blackboard::new(),
            tracker,
            history: Vec::new(),
        }
    }

    pub fn with_variables(mut self, variables: Blackboard) -> Self {
        self.variables = variables;
        self
    }

    pub fn graph(&self) -> &DialogGraph {
        &self.graph
    }

    pub fn into_graph(self) -> DialogGraph {
        self.graph
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn variables(&self) -> &Blackboard {
        &self.variables
    }

    pub fn variables_mut(&mut self) -> &mut Blackboard {
        &mut self.variables
    }

    pub fn tracker(&self) -> &T {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut T {
        &mut self.tracker
    }

    /// Nodes processed so far, in order.
    pub fn history(&self) -> &[NodeId] {
        &self.history
    }

    pub fn is_active(&self) -> bool {
        matches!(
            self.state,
            SessionState::Awaiting { .. } | SessionState::Delayed { .. }
        )
    }

    pub fn has_ended(&self) -> bool {
        self.state == SessionState::Ended
    }

    /// Input the current node is waiting for, if any.
    pub fn pending(&self) -> Option<Expect> {
        match self.state {
            SessionState::Awaiting { input, .. } => Some(input),
            _ => None,
        }
    }

    /// Process the root node. A graph without root ends immediately.
    pub fn start(&mut self, events: &mut dyn EventBus) -> Result<(), SessionError> {
        if self.state != SessionState::Idle {
            return Err(SessionError::AlreadyStarted);
        }
        info!("Starting dialog '{}'", self.graph.namespace());
        self.run(self.graph.root(), events);
        Ok(())
    }

    /// Jump to `id`, dropping whatever the session was waiting for.
    pub fn process_node(
        &mut self,
        id: NodeId,
        events: &mut dyn EventBus,
    ) -> Result<(), SessionError> {
        if self.graph.node(id).is_none() {
            return Err(SessionError::UnknownNode(id.index()));
        }
        self.settle_pending();
        self.run(Some(id), events);
        Ok(())
    }

    /// Answer the node the session is suspended on.
    ///
    /// On error the session keeps waiting on the same node.
    pub fn resume(
        &mut self,
        input: DialogInput,
        events: &mut dyn EventBus,
    ) -> Result<(), SessionError> {
        let (node, expect) = match self.state {
            SessionState::Awaiting { node, input } => (node, input),
            SessionState::Idle => return Err(SessionError::NotStarted),
            SessionState::Ended => return Err(SessionError::Ended),
            SessionState::Delayed { .. } => return Err(SessionError::Advancing),
        };

        let entry = self
            .graph
            .nodes
            .get_mut(node.index())
            .ok_or(SessionError::UnknownNode(node.index()))?;
        if !expect.accepts(&input) {
            return Err(SessionError::UnexpectedInput {
                node: entry.key.global_id.clone(),
                input: input.name(),
            });
        }

        let mut cx = NodeContext {
            node,
            key: &entry.key,
            events: &mut *events,
            tracker: &mut self.tracker,
            variables: &mut self.variables,
        };
        match entry.behavior.resume(input, &mut cx)? {
            Step::Await(expect) => {
                self.state = SessionState::Awaiting {
                    node,
                    input: expect,
                };
            }
            Step::Advance => {
                if let Transition::Continue(target) = self.leave(node) {
                    self.run(target, events);
                }
            }
        }
        Ok(())
    }

    /// Let time pass. Only matters while a delayed advance is pending.
    pub fn update(&mut self, elapsed: Duration, events: &mut dyn EventBus) {
        let SessionState::Delayed {
            from,
            index,
            target,
            remaining,
        } = &mut self.state
        else {
            return;
        };
        if elapsed < *remaining {
            *remaining -= elapsed;
            return;
        }
        let (from, index, target) = (*from, *index, *target);
        self.complete_advance(from, index, target, events);
    }

    /// Finish a pending delayed advance right away.
    pub fn skip_delay(&mut self, events: &mut dyn EventBus) -> bool {
        match self.state {
            SessionState::Delayed {
                from,
                index,
                target,
                ..
            } => {
                self.complete_advance(from, index, target, events);
                true
            }
            _ => false,
        }
    }

    /// Stop the traversal. A pending delayed advance is cancelled, but the
    /// node it leaves still settles (a picked one-shot option is removed).
    pub fn abort(&mut self, events: &mut dyn EventBus) {
        self.settle_pending();
        if self.is_active() {
            info!("Dialog '{}' aborted", self.graph.namespace());
            events.dispatch(DialogEvent::ClearNodes);
        }
        self.state = SessionState::Ended;
    }

    /// Back to [`SessionState::Idle`]. Node state such as removed choices is kept.
    pub fn restart(&mut self) {
        self.settle_pending();
        self.state = SessionState::Idle;
        self.history.clear();
    }

    // -----------------------------------------------------------------------
    // Traversal
    // -----------------------------------------------------------------------

    fn run(&mut self, mut next: Option<NodeId>, events: &mut dyn EventBus) {
        let mut hops = 0;
        while let Some(id) = next {
            hops += 1;
            if hops > MAX_PASS_THROUGH {
                warn!(
                    "Dialog '{}' advanced {MAX_PASS_THROUGH} nodes without input, stopping",
                    self.graph.namespace()
                );
                break;
            }

            let Some(step) = self.enter(id, events) else {
                warn!("No node {id} in '{}'", self.graph.namespace());
                break;
            };
            match step {
                Step::Await(input) => {
                    self.state = SessionState::Awaiting { node: id, input };
                    return;
                }
                Step::Advance => match self.leave(id) {
                    Transition::Continue(target) => next = target,
                    Transition::Wait => return,
                },
            }
        }
        self.finish(events);
    }

    fn enter(&mut self, id: NodeId, events: &mut dyn EventBus) -> Option<Step> {
        let entry = self.graph.nodes.get_mut(id.index())?;
        debug!("Processing {} node '{}'", entry.type_name(), entry.key.global_id);
        self.history.push(id);

        let mut cx = NodeContext {
            node: id,
            key: &entry.key,
            events,
            tracker: &mut self.tracker,
            variables: &mut self.variables,
        };
        Some(entry.behavior.process(&mut cx))
    }

    /// Pick the successor of `from`, honoring its `next_delay`.
    fn leave(&mut self, from: NodeId) -> Transition {
        let Some(node) = self.graph.nodes.get_mut(from.index()) else {
            return Transition::Continue(None);
        };
        let index = node.next_index();
        let target = node.successor();
        let delay = node.next_delay();

        if delay.is_zero() {
            node.behavior.after_advance(index);
            return Transition::Continue(target);
        }
        debug!("Leaving '{}' in {delay:?}", node.key.global_id);
        self.state = SessionState::Delayed {
            from,
            index,
            target,
            remaining: delay,
        };
        Transition::Wait
    }

    fn complete_advance(
        &mut self,
        from: NodeId,
        index: usize,
        target: Option<NodeId>,
        events: &mut dyn EventBus,
    ) {
        self.settle(from, index);
        self.run(target, events);
    }

    fn settle(&mut self, from: NodeId, index: usize) {
        if let Some(node) = self.graph.nodes.get_mut(from.index()) {
            node.behavior.after_advance(index);
        }
    }

    /// Run `after_advance` for a delayed advance that is being dropped.
    /// The state stays `Delayed`; callers replace it.
    fn settle_pending(&mut self) {
        if let SessionState::Delayed { from, index, .. } = self.state {
            debug!("Dropping pending advance from {from}");
            self.settle(from, index);
        }
    }

    fn finish(&mut self, events: &mut dyn EventBus) {
        info!(
            "Dialog '{}' ended after {} nodes",
            self.graph.namespace(),
            self.history.len()
        );
        self.state = SessionState::Ended;
        events.dispatch(DialogEvent::EndNodes);
    }
}
