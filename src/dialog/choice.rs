use std::any::Any;

use log::{debug, warn};
use rand::seq::SliceRandom;
use serde::Deserialize;
use serde_json::Value;

use super::node::{
    lenient_bool, lenient_opt_bool, parse_entry, Expect, LinkContext, NodeBehavior, NodeContext,
    NodeId, NodeKey, Step, TranslateContext,
};
use crate::error::{LoadError, SessionError};
use crate::events::{ChoiceView, DialogEvent, DialogInput};

/// One selectable option. Text, successor and repeat flag travel together,
/// so shuffling and removal cannot misalign them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceOption {
    pub text: String,
    pub next: Option<NodeId>,
    /// `false` removes the option once it has been picked.
    pub repeat: bool,
}

/// Multiple-choice branching point.
///
/// ```json
/// "ask": {
///     "type": "choice",
///     "choices": [ { "next": "yes", "repeat": false }, { "next": "no" } ],
///     "shuffle": true
/// }
/// ```
///
/// Option texts come from the dialog namespace as a list under the node's full id.
#[derive(Debug, Clone, Default)]
pub struct ChoiceNode {
    options: Vec<ChoiceOption>,
    shuffle: bool,
    next_index: usize,
}

#[derive(Debug, Deserialize)]
struct ChoiceEntry {
    #[serde(default)]
    choices: Vec<OptionEntry>,
    #[serde(default, deserialize_with = "lenient_bool")]
    shuffle: bool,
}

#[derive(Debug, Deserialize)]
struct OptionEntry {
    #[serde(default)]
    next: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_bool")]
    repeat: Option<bool>,
}

impl ChoiceNode {
    pub const TYPE: &'static str = "choice";

    pub fn from_entry(
        _key: &NodeKey,
        entry: &Value,
        links: &mut LinkContext<'_>,
    ) -> Result<Self, LoadError> {
        let entry: ChoiceEntry = parse_entry(links.owner(), entry)?;

        let options = entry
            .choices
            .iter()
            .map(|option| {
                let next = match option.next.as_deref() {
                    Some(id) if !id.is_empty() => links.resolve(id)?,
                    _ => None,
                };
                Ok(ChoiceOption {
                    text: String::new(),
                    next,
                    repeat: option.repeat.unwrap_or(true),
                })
            })
            .collect::<Result<Vec<_>, LoadError>>()?;

        Ok(Self {
            options,
            shuffle: entry.shuffle,
            next_index: 0,
        })
    }

    pub fn options(&self) -> &[ChoiceOption] {
        &self.options
    }

    pub fn choices(&self) -> Vec<&str> {
        self.options.iter().map(|o| o.text.as_str()).collect()
    }

    pub fn is_shuffled(&self) -> bool {
        self.shuffle
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    fn align_texts(
        &self,
        key: &NodeKey,
        mut texts: Vec<String>,
        cx: &TranslateContext<'_>,
    ) -> Result<Vec<String>, LoadError> {
        if texts.len() == self.options.len() {
            return Ok(texts);
        }
        if cx.policy().is_strict() {
            return Err(LoadError::ChoiceMismatch {
                id: key.id.clone(),
                options: self.options.len(),
                texts: texts.len(),
            });
        }
        warn!(
            "Choice node '{}' has {} options but {} texts",
            key.global_id,
            self.options.len(),
            texts.len()
        );
        texts.resize(self.options.len(), key.full_id.clone());
        Ok(texts)
    }
}

impl NodeBehavior for ChoiceNode {
    fn type_name(&self) -> &'static str {
        Self::TYPE
    }

    fn successors(&self) -> Vec<Option<NodeId>> {
        self.options.iter().map(|o| o.next).collect()
    }

    fn next_index(&self) -> usize {
        self.next_index
    }

    fn translate(&mut self, key: &NodeKey, cx: &mut TranslateContext<'_>) -> Result<(), LoadError> {
        let texts = self.align_texts(key, cx.fragments(&key.full_id), cx)?;
        for (option, text) in self.options.iter_mut().zip(texts) {
            option.text = text;
        }

        if self.shuffle {
            self.options.shuffle(cx.rng());
            debug!("Shuffled {} options of '{}'", self.options.len(), key.global_id);
        }
        Ok(())
    }

    fn process(&mut self, cx: &mut NodeContext<'_>) -> Step {
        if self.options.is_empty() {
            return Step::Advance;
        }

        let view = ChoiceView {
            node: cx.node(),
            choices: self.options.iter().map(|o| o.text.clone()).collect(),
        };
        cx.emit(DialogEvent::StartChoiceNode(view));
        Step::Await(Expect::SelectChoice)
    }

    fn resume(
        &mut self,
        input: DialogInput,
        cx: &mut NodeContext<'_>,
    ) -> Result<Step, SessionError> {
        let DialogInput::SelectChoice(index) = input else {
            return Err(SessionError::UnexpectedInput {
                node: cx.key().global_id.clone(),
                input: input.name(),
            });
        };
        let Some(option) = self.options.get(index) else {
            return Err(SessionError::InvalidChoice {
                index,
                available: self.options.len(),
            });
        };

        let node = cx.key().global_id.clone();
        cx.tracker().choice_selected(&node, &option.text);
        self.next_index = index;
        Ok(Step::Advance)
    }

    fn after_advance(&mut self, index: usize) {
        if self.options.get(index).is_some_and(|o| !o.repeat) {
            let removed = self.options.remove(index);
            debug!("Removed non-repeatable option '{}'", removed.text);
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialog::testing::{build, Harness};
    use crate::dialog::SessionState;
    use crate::tracker::Statement;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn three_options(shuffle: bool) -> Harness {
        Harness::new(
            json!({
                "root": {
                    "type": "choice",
                    "shuffle": shuffle,
                    "choices": [
                        { "next": "a" },
                        { "next": "b", "repeat": false },
                        { "next": "c", "repeat": true }
                    ]
                },
                "a": { "type": "text", "next": "root" },
                "b": { "type": "text", "next": "root" },
                "c": { "type": "text", "next": "root" }
            }),
            json!({
                "root": [ { "text": "Ask A" }, { "text": "Ask B" }, { "text": "Ask C" } ],
                "a": "Answer A",
                "b": "Answer B",
                "c": "Answer C"
            }),
        )
    }

    fn choice(graph: &crate::dialog::DialogGraph) -> &ChoiceNode {
        graph.get("root").unwrap().downcast_ref::<ChoiceNode>().unwrap()
    }

    fn assert_aligned(node: &ChoiceNode) {
        assert_eq!(node.choices().len(), node.successors().len());
        assert_eq!(node.options().len(), node.successors().len());
    }

    #[test]
    fn test_options_read_in_order() {
        let graph = build(&three_options(false));
        let node = choice(&graph);

        assert_eq!(node.choices(), vec!["Ask A", "Ask B", "Ask C"]);
        assert_eq!(
            node.options().iter().map(|o| o.repeat).collect::<Vec<_>>(),
            vec![true, false, true]
        );
        let next = node.successors();
        assert_eq!(next[0], graph.find("a"));
        assert_eq!(next[1], graph.find("b"));
        assert_eq!(next[2], graph.find("c"));
    }

    #[test]
    fn test_non_repeating_option_removed_after_pick() {
        let harness = three_options(false);
        let mut session = harness.session();
        let mut events = Vec::new();
        session.start(&mut events).unwrap();

        session
            .resume(DialogInput::SelectChoice(1), &mut events)
            .unwrap();
        assert!(matches!(&events[1], DialogEvent::StartTextNode(v) if v.text == "Answer B"));
        assert_aligned(choice(session.graph()));

        let root = session.graph().root().unwrap();
        events.clear();
        session.process_node(root, &mut events).unwrap();

        assert_eq!(
            events,
            vec![DialogEvent::StartChoiceNode(ChoiceView {
                node: root,
                choices: vec!["Ask A".into(), "Ask C".into()],
            })]
        );
        let next = choice(session.graph()).successors();
        assert_eq!(next, vec![session.graph().find("a"), session.graph().find("c")]);
    }

    #[test]
    fn test_repeating_option_stays() {
        let harness = three_options(false);
        let mut session = harness.session();
        let mut events = Vec::new();
        session.start(&mut events).unwrap();

        session
            .resume(DialogInput::SelectChoice(0), &mut events)
            .unwrap();
        session.resume(DialogInput::NextDialog, &mut events).unwrap();

        assert_eq!(choice(session.graph()).len(), 3);
        assert!(matches!(
            events.last(),
            Some(DialogEvent::StartChoiceNode(v)) if v.choices.len() == 3
        ));
    }

    #[test]
    fn test_removal_waits_for_delay() {
        let mut harness = three_options(false);
        harness.definition["root"]["nextDelay"] = json!(250);
        let mut session = harness.session();
        let mut events = Vec::new();
        session.start(&mut events).unwrap();

        session
            .resume(DialogInput::SelectChoice(1), &mut events)
            .unwrap();
        assert!(matches!(session.state(), SessionState::Delayed { .. }));
        assert_eq!(choice(session.graph()).len(), 3);

        session.update(std::time::Duration::from_millis(100), &mut events);
        assert_eq!(choice(session.graph()).len(), 3);

        session.update(std::time::Duration::from_millis(150), &mut events);
        assert_eq!(choice(session.graph()).choices(), vec!["Ask A", "Ask C"]);
        assert!(matches!(events.last(), Some(DialogEvent::StartTextNode(v)) if v.text == "Answer B"));
    }

    #[test]
    fn test_jump_during_delay_still_removes_option() {
        let mut harness = three_options(false);
        harness.definition["root"]["nextDelay"] = json!(250);
        let mut session = harness.session();
        let mut events = Vec::new();
        session.start(&mut events).unwrap();
        session
            .resume(DialogInput::SelectChoice(1), &mut events)
            .unwrap();

        let root = session.graph().root().unwrap();
        session.process_node(root, &mut events).unwrap();
        session.update(std::time::Duration::from_secs(5), &mut events);

        assert_eq!(
            session.state(),
            &SessionState::Awaiting {
                node: root,
                input: Expect::SelectChoice
            }
        );
        assert_eq!(choice(session.graph()).choices(), vec!["Ask A", "Ask C"]);
        assert!(matches!(
            events.last(),
            Some(DialogEvent::StartChoiceNode(v)) if v.choices == ["Ask A", "Ask C"]
        ));
    }

    #[test]
    fn test_abort_during_delay_still_removes_option() {
        let mut harness = three_options(false);
        harness.definition["root"]["nextDelay"] = json!(250);
        let mut session = harness.session();
        let mut events = Vec::new();
        session.start(&mut events).unwrap();
        session
            .resume(DialogInput::SelectChoice(1), &mut events)
            .unwrap();

        session.abort(&mut events);
        assert_eq!(events.last(), Some(&DialogEvent::ClearNodes));
        assert_eq!(choice(session.graph()).choices(), vec!["Ask A", "Ask C"]);
    }

    #[test]
    fn test_shuffle_keeps_triples_together() {
        let harness = three_options(true);
        for seed in 0..16 {
            let graph = harness.clone().seeded(seed).read().unwrap();
            let node = choice(&graph);
            assert_aligned(node);
            for option in node.options() {
                let target = graph.node(option.next.unwrap()).unwrap();
                let letter = target.id().to_uppercase();
                assert_eq!(option.text, format!("Ask {letter}"));
                assert_eq!(option.repeat, letter != "B");
            }
        }
    }

    #[test]
    fn test_shuffle_is_deterministic_per_seed() {
        let harness = three_options(true).seeded(99);
        let first = build(&harness);
        let second = build(&harness);
        assert_eq!(choice(&first).choices(), choice(&second).choices());
    }

    #[test]
    fn test_out_of_range_choice_keeps_waiting() {
        let harness = three_options(false);
        let mut session = harness.recording_session();
        let mut events = Vec::new();
        session.start(&mut events).unwrap();

        let err = session
            .resume(DialogInput::SelectChoice(7), &mut events)
            .unwrap_err();
        assert_eq!(err, SessionError::InvalidChoice { index: 7, available: 3 });
        assert!(matches!(session.state(), SessionState::Awaiting { .. }));

        session
            .resume(DialogInput::SelectChoice(2), &mut events)
            .unwrap();
        assert_eq!(
            session.tracker().statements.first(),
            Some(&Statement::Selected {
                node: "test.root".into(),
                response: "Ask C".into()
            })
        );
    }

    #[test]
    fn test_empty_choice_passes_through() {
        let harness = Harness::new(
            json!({ "root": { "type": "choice", "choices": [] } }),
            json!({}),
        );
        let mut session = harness.session();
        let mut events = Vec::new();
        session.start(&mut events).unwrap();
        assert_eq!(events, vec![DialogEvent::EndNodes]);
    }

    #[test]
    fn test_text_count_mismatch() {
        let definition = json!({
            "root": { "type": "choice", "choices": [ { "next": "" }, { "next": "" } ] }
        });
        let texts = json!({ "root": [ { "text": "Only one" } ] });

        let err = Harness::new(definition.clone(), texts.clone())
            .read()
            .unwrap_err();
        assert!(matches!(err, LoadError::ChoiceMismatch { options: 2, texts: 1, .. }));

        let graph = Harness::new(definition, texts).permissive().read().unwrap();
        assert_eq!(choice(&graph).choices(), vec!["Only one", "root"]);
    }
}
