use std::any::Any;
use std::cmp::Ordering;

use log::debug;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::node::{parse_entry, LinkContext, NodeBehavior, NodeContext, NodeId, NodeKey, Step};
use crate::blackboard::Blackboard;
use crate::error::LoadError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operator {
    #[default]
    Equal,
    NotEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
}

impl Operator {
    fn holds(self, actual: &Value, expected: &Value) -> bool {
        match self {
            Operator::Equal => actual == expected,
            Operator::NotEqual => actual != expected,
            ordered => match compare(actual, expected) {
                Some(ord) => match ordered {
                    Operator::Greater => ord == Ordering::Greater,
                    Operator::GreaterEqual => ord != Ordering::Less,
                    Operator::Less => ord == Ordering::Less,
                    Operator::LessEqual => ord != Ordering::Greater,
                    Operator::Equal | Operator::NotEqual => false,
                },
                None => false,
            },
        }
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// A test against one blackboard variable.
#[derive(Debug, Clone, PartialEq)]
pub struct Requirement {
    pub variable: String,
    pub operator: Operator,
    pub value: Value,
    /// Used when the variable has never been set.
    pub default: Option<Value>,
}

impl Requirement {
    pub fn holds(&self, variables: &Blackboard) -> bool {
        match variables.get(&self.variable).or(self.default.as_ref()) {
            Some(actual) => self.operator.holds(actual, &self.value),
            None => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConditionBranch {
    pub requirements: Vec<Requirement>,
    pub next: Option<NodeId>,
}

impl ConditionBranch {
    /// A branch without requirements always holds.
    pub fn holds(&self, variables: &Blackboard) -> bool {
        self.requirements.iter().all(|r| r.holds(variables))
    }
}

/// Branches on game state held in the session blackboard.
///
/// ```json
/// "check": {
///     "type": "condition",
///     "conditions": [
///         { "next": "again", "talked": { "value": true } },
///         { "next": "first" }
///     ]
/// }
/// ```
///
/// The first branch whose requirements all hold is taken. When none does,
/// traversal ends.
#[derive(Debug, Clone, Default)]
pub struct ConditionNode {
    branches: Vec<ConditionBranch>,
    next_index: usize,
}

#[derive(Debug, Deserialize)]
struct ConditionEntry {
    #[serde(default)]
    conditions: Vec<BranchEntry>,
}

#[derive(Debug, Deserialize)]
struct BranchEntry {
    #[serde(default)]
    next: Option<String>,
    #[serde(flatten)]
    requirements: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct RequirementEntry {
    value: Value,
    #[serde(default)]
    operator: Operator,
    #[serde(default)]
    default: Option<Value>,
}

impl ConditionNode {
    pub const TYPE: &'static str = "condition";

    pub fn from_entry(
        _key: &NodeKey,
        entry: &Value,
        links: &mut LinkContext<'_>,
    ) -> Result<Self, LoadError> {
        let entry: ConditionEntry = parse_entry(links.owner(), entry)?;

        let mut branches = Vec::with_capacity(entry.conditions.len());
        for branch in entry.conditions {
            let next = match branch.next.as_deref() {
                Some(id) if !id.is_empty() => links.resolve(id)?,
                _ => None,
            };

            let requirements = branch
                .requirements
                .into_iter()
                .map(|(variable, raw)| {
                    let parsed: RequirementEntry =
                        serde_json::from_value(raw).map_err(|e| LoadError::InvalidCondition {
                            id: links.owner().to_string(),
                            reason: format!("requirement on '{variable}': {e}"),
                        })?;
                    Ok(Requirement {
                        variable,
                        operator: parsed.operator,
                        value: parsed.value,
                        default: parsed.default,
                    })
                })
                .collect::<Result<Vec<_>, LoadError>>()?;

            branches.push(ConditionBranch { requirements, next });
        }

        Ok(Self {
            branches,
            next_index: 0,
        })
    }

    pub fn branches(&self) -> &[ConditionBranch] {
        &self.branches
    }

    /// Index of the first branch that holds, or `branches.len()` if none does.
    pub fn evaluate(&self, variables: &Blackboard) -> usize {
        self.branches
            .iter()
            .position(|b| b.holds(variables))
            .unwrap_or(self.branches.len())
    }
}

impl NodeBehavior for ConditionNode {
    fn type_name(&self) -> &'static str {
        Self::TYPE
    }

    fn successors(&self) -> Vec<Option<NodeId>> {
        self.branches.iter().map(|b| b.next).collect()
    }

    fn next_index(&self) -> usize {
        self.next_index
    }

    fn process(&mut self, cx: &mut NodeContext<'_>) -> Step {
        self.next_index = self.evaluate(cx.variables());
        debug!(
            "Condition '{}' took branch {} of {}",
            cx.key().global_id,
            self.next_index,
            self.branches.len()
        );
        Step::Advance
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialog::testing::{build, Harness};
    use crate::events::DialogEvent;
    use serde_json::json;

    fn gate() -> Harness {
        Harness::new(
            json!({
                "root": {
                    "type": "condition",
                    "conditions": [
                        { "next": "rich", "gold": { "value": 10, "operator": "greaterEqual", "default": 0 } },
                        { "next": "known", "talked": { "value": true } },
                        { "next": "stranger" }
                    ]
                },
                "rich": { "type": "text" },
                "known": { "type": "text" },
                "stranger": { "type": "text" }
            }),
            json!({ "rich": "Welcome back, patron.", "known": "Oh, you again.", "stranger": "Who are you?" }),
        )
    }

    fn first_text(harness: &Harness, variables: Blackboard) -> String {
        let mut session = harness.session().with_variables(variables);
        let mut events = Vec::new();
        session.start(&mut events).unwrap();
        match events.first() {
            Some(DialogEvent::StartTextNode(view)) => view.text.clone(),
            other => panic!("expected text, got {other:?}"),
        }
    }

    #[test]
    fn test_branch_order_and_fallback() {
        let harness = gate();
        assert_eq!(first_text(&harness, Blackboard::new()), "Who are you?");
        assert_eq!(
            first_text(&harness, [("talked", json!(true))].into_iter().collect()),
            "Oh, you again."
        );
        assert_eq!(
            first_text(
                &harness,
                [("talked", json!(true)), ("gold", json!(12))].into_iter().collect()
            ),
            "Welcome back, patron."
        );
    }

    #[test]
    fn test_no_branch_ends_dialog() {
        let harness = Harness::new(
            json!({
                "root": { "type": "condition", "conditions": [ { "next": "x", "flag": { "value": 1 } } ] },
                "x": { "type": "text" }
            }),
            json!({}),
        );
        let mut session = harness.session();
        let mut events = Vec::new();
        session.start(&mut events).unwrap();
        assert_eq!(events, vec![DialogEvent::EndNodes]);
        assert_eq!(session.graph().root_node().unwrap().next_index(), 1);
    }

    #[test]
    fn test_operators() {
        let vars: Blackboard = [("n", json!(5)), ("s", json!("b"))].into_iter().collect();
        let req = |variable: &str, operator, value| Requirement {
            variable: variable.into(),
            operator,
            value,
            default: None,
        };
        assert!(req("n", Operator::Greater, json!(4)).holds(&vars));
        assert!(req("n", Operator::LessEqual, json!(5.0)).holds(&vars));
        assert!(req("n", Operator::NotEqual, json!(6)).holds(&vars));
        assert!(req("s", Operator::Less, json!("c")).holds(&vars));
        assert!(!req("s", Operator::Greater, json!(1)).holds(&vars));
        assert!(!req("missing", Operator::Equal, json!(null)).holds(&vars));
    }

    #[test]
    fn test_bad_requirement_is_reported() {
        let harness = Harness::new(
            json!({ "root": { "type": "condition", "conditions": [ { "flag": true } ] } }),
            json!({}),
        );
        let err = harness.read().unwrap_err();
        assert!(matches!(err, LoadError::InvalidCondition { id, .. } if id == "root"));
    }

    #[test]
    fn test_successors_follow_branches() {
        let graph = build(&gate());
        let root = graph.root_node().unwrap();
        assert_eq!(
            root.next(),
            vec![graph.find("rich"), graph.find("known"), graph.find("stranger")]
        );
    }
}
