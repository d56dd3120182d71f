use std::any::Any;

use log::{debug, warn};
use serde::Deserialize;
use serde_json::Value;

use super::node::{
    lenient_bool, parse_entry, Expect, LinkContext, NextField, NodeBehavior, NodeContext,
    NodeId, NodeKey, Step, TranslateContext,
};
use crate::error::{LoadError, SessionError};
use crate::events::{DialogEvent, DialogInput, TextView};

/// A speaker saying one or more fragments, shown one at a time.
///
/// ```json
/// "greet": { "type": "text", "character": "mom", "next": "ask", "centered": true }
/// ```
///
/// The fragments come from the dialog namespace under the node's full id,
/// either as a single `{ "text": ... }` or as a list of them.
#[derive(Debug, Clone, Default)]
pub struct TextNode {
    character: Option<String>,
    name: String,
    dialogs: Vec<String>,
    curr_dialog: usize,
    centered: bool,
    next: Vec<Option<NodeId>>,
}

#[derive(Debug, Deserialize)]
struct TextEntry {
    character: Option<String>,
    next: Option<NextField>,
    #[serde(default, deserialize_with = "lenient_bool")]
    centered: bool,
}

impl TextNode {
    pub const TYPE: &'static str = "text";

    pub fn from_entry(
        _key: &NodeKey,
        entry: &Value,
        links: &mut LinkContext<'_>,
    ) -> Result<Self, LoadError> {
        let entry: TextEntry = parse_entry(links.owner(), entry)?;
        let mut ids = entry.next.as_ref().map(NextField::ids).unwrap_or_default();
        if ids.len() > 1 {
            warn!(
                "Text node '{}' lists {} successors, only the first is kept",
                links.owner(),
                ids.len()
            );
            ids.truncate(1);
        }

        Ok(Self {
            character: entry.character,
            centered: entry.centered,
            next: links.resolve_all(ids)?,
            ..Self::default()
        })
    }

    pub fn character(&self) -> Option<&str> {
        self.character.as_deref()
    }

    /// Localized speaker name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dialogs(&self) -> &[String] {
        &self.dialogs
    }

    pub fn current_dialog(&self) -> usize {
        self.curr_dialog
    }

    pub fn current_text(&self) -> Option<&str> {
        self.dialogs.get(self.curr_dialog).map(String::as_str)
    }

    pub fn is_centered(&self) -> bool {
        self.centered
    }

    fn view(&self, node: NodeId, text: &str) -> TextView {
        TextView {
            node,
            character: self.character.clone(),
            name: self.name.clone(),
            text: text.to_string(),
            fragment: self.curr_dialog,
            fragments: self.dialogs.len(),
            centered: self.centered,
        }
    }
}

impl NodeBehavior for TextNode {
    fn type_name(&self) -> &'static str {
        Self::TYPE
    }

    fn successors(&self) -> Vec<Option<NodeId>> {
        self.next.clone()
    }

    fn translate(&mut self, key: &NodeKey, cx: &mut TranslateContext<'_>) -> Result<(), LoadError> {
        if let Some(character) = &self.character {
            self.name = cx.speaker_name(character).unwrap_or_else(|| {
                debug!("No display name for '{character}', using the id");
                character.clone()
            });
        }
        self.dialogs = cx.fragments(&key.full_id);
        if self.dialogs.is_empty() {
            debug!("Text node '{}' has no fragments", key.global_id);
        }
        Ok(())
    }

    fn process(&mut self, cx: &mut NodeContext<'_>) -> Step {
        self.curr_dialog = 0;
        let Some(first) = self.dialogs.first() else {
            return Step::Advance;
        };

        cx.tracker().dialog_started(&self.name, first);
        let view = self.view(cx.node(), first);
        cx.emit(DialogEvent::StartTextNode(view));
        Step::Await(Expect::NextDialog)
    }

    fn resume(
        &mut self,
        input: DialogInput,
        cx: &mut NodeContext<'_>,
    ) -> Result<Step, SessionError> {
        if input != DialogInput::NextDialog {
            return Err(SessionError::UnexpectedInput {
                node: cx.key().global_id.clone(),
                input: input.name(),
            });
        }

        if let Some(current) = self.dialogs.get(self.curr_dialog) {
            cx.tracker().dialog_completed(&self.name, current);
        }
        self.curr_dialog += 1;

        match self.dialogs.get(self.curr_dialog) {
            Some(text) => {
                cx.tracker().dialog_started(&self.name, text);
                let view = self.view(cx.node(), text);
                cx.emit(DialogEvent::UpdateTextNode(view));
                Ok(Step::Await(Expect::NextDialog))
            }
            None => Ok(Step::Advance),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
