use log::info;

/// Telemetry sink for learning-analytics style statements.
///
/// Every method has an empty default so hosts only implement what they
/// report on.
pub trait Tracker {
    /// A text fragment was shown.
    fn dialog_started(&mut self, _name: &str, _text: &str) {}

    /// The player moved past a text fragment.
    fn dialog_completed(&mut self, _name: &str, _text: &str) {}

    /// The player picked `response` at the choice node `node`.
    fn choice_selected(&mut self, _node: &str, _response: &str) {}
}

/// Label used for a fragment in story-node statements.
pub fn story_node_label(name: &str, text: &str) -> String {
    format!("{} {}", name.trim(), text.trim())
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTracker;

impl Tracker for NoopTracker {}

/// Writes statements to the log under the `tracker` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTracker;

impl Tracker for LogTracker {
    fn dialog_started(&mut self, name: &str, text: &str) {
        info!(target: "tracker", "initialized: {}", story_node_label(name, text));
    }

    fn dialog_completed(&mut self, name: &str, text: &str) {
        info!(target: "tracker", "completed: {}", story_node_label(name, text));
    }

    fn choice_selected(&mut self, node: &str, response: &str) {
        info!(target: "tracker", "selected: {node} -> {response}");
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    Initialized(String),
    Completed(String),
    Selected { node: String, response: String },
}

/// Keeps statements in memory.
#[derive(Debug, Default, Clone)]
pub struct RecordingTracker {
    pub statements: Vec<Statement>,
}

impl RecordingTracker {
    pub fn completed(&self) -> usize {
        self.statements
            .iter()
            .filter(|s| matches!(s, Statement::Completed(_)))
            .count()
    }

    pub fn selections(&self) -> usize {
        self.statements
            .iter()
            .filter(|s| matches!(s, Statement::Selected { .. }))
            .count()
    }
}

impl Tracker for RecordingTracker {
    fn dialog_started(&mut self, name: &str, text: &str) {
        self.statements
            .push(Statement::Initialized(story_node_label(name, text)));
    }

    fn dialog_completed(&mut self, name: &str, text: &str) {
        self.statements
            .push(Statement::Completed(story_node_label(name, text)));
    }

    fn choice_selected(&mut self, node: &str, response: &str) {
        self.statements.push(Statement::Selected {
            node: node.to_string(),
            response: response.to_string(),
        });
    }
}

/// Reports to both trackers, left first.
impl<A: Tracker, B: Tracker> Tracker for (A, B) {
    fn dialog_started(&mut self, name: &str, text: &str) {
        self.0.dialog_started(name, text);
        self.1.dialog_started(name, text);
    }

    fn dialog_completed(&mut self, name: &str, text: &str) {
        self.0.dialog_completed(name, text);
        self.1.dialog_completed(name, text);
    }

    fn choice_selected(&mut self, node: &str, response: &str) {
        self.0.choice_selected(node, response);
        self.1.choice_selected(node, response);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_story_node_label_trims() {
        assert_eq!(story_node_label(" Mom ", " Hello.\n"), "Mom Hello.");
    }

    #[test]
    fn test_recording_tracker_counts() {
        let mut tracker = RecordingTracker::default();
        tracker.dialog_started("Mom", "Hi");
        tracker.dialog_completed("Mom", "Hi");
        tracker.choice_selected("home.root", "Bye");
        assert_eq!(tracker.completed(), 1);
        assert_eq!(tracker.selections(), 1);
        assert_eq!(tracker.statements[0], Statement::Initialized("Mom Hi".into()));
    }

    #[test]
    fn test_pair_reports_to_both() {
        let mut pair = (RecordingTracker::default(), RecordingTracker::default());
        pair.choice_selected("home.ask", "Stay");
        assert_eq!(pair.0.statements, pair.1.statements);
        assert_eq!(pair.1.selections(), 1);
    }
}
