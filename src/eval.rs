use std::collections::VecDeque;

use log::debug;
use serde::Serialize;

use crate::attribute_value::Attributes;
use crate::error::Error;
use crate::flag_value::FlagValue;

/// A node of the evaluation tree: a flag, one of its rules, or a rule's distribution list.
pub trait Evaluable {
    /// Evaluates this node against the attribute set.
    ///
    /// The returned step may carry an answer, children to visit next, both, or neither.
    fn evaluate<'a>(&'a self, attributes: &Attributes) -> Result<Step<'a>, Error>;

    /// Coarse type tag recorded in traces.
    fn kind(&self) -> &'static str;

    fn id(&self) -> Option<&str> {
        None
    }
}

/// What a single [Evaluable] produced.
#[derive(Default)]
pub struct Step<'a> {
    pub answer: Option<&'a FlagValue>,
    pub next: Vec<&'a dyn Evaluable>,
}

/// One entry of an evaluation trace.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Trace {
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub answer: Option<FlagValue>,
}

struct Visit<'a> {
    evaluable: &'a dyn Evaluable,
    answer: Option<&'a FlagValue>,
}

/// The result of walking an evaluation tree.
///
/// `answer` is the terminal answer if one was reached, otherwise the most recent fallback. `next`
/// holds the children of the step that supplied the answer.
#[derive(Default)]
pub struct Outcome<'a> {
    pub answer: Option<&'a FlagValue>,
    pub next: Vec<&'a dyn Evaluable>,
    visits: Vec<Visit<'a>>,
}

impl<'a> Outcome<'a> {
    /// The steps leading to the answer, most recent first and ending at the root.
    ///
    /// Empty when no step ever produced an answer.
    pub fn stack(&self) -> Vec<Trace> {
        self.visits
            .iter()
            .rev()
            .map(|v| Trace {
                kind: v.evaluable.kind(),
                id: v.evaluable.id().map(str::to_owned),
                answer: v.answer.cloned(),
            })
            .collect()
    }
}

/// Walks the tree rooted at `root`, breadth-first with children of a node visited before its
/// queued siblings.
///
/// A step with an answer and no children ends the walk. A step with an answer and children
/// becomes the fallback that is returned if the walk runs out of nodes. The first error aborts.
pub fn evaluate<'a>(
    attributes: &Attributes,
    root: &'a dyn Evaluable,
) -> Result<Outcome<'a>, Error> {
    let mut queue: VecDeque<&'a dyn Evaluable> = VecDeque::from([root]);
    let mut visits = Vec::new();
    let mut fallback: Option<(&'a FlagValue, Vec<&'a dyn Evaluable>, usize)> = None;

    while let Some(evaluable) = queue.pop_front() {
        let step = evaluable.evaluate(attributes)?;
        visits.push(Visit {
            evaluable,
            answer: step.answer,
        });

        if let Some(answer) = step.answer {
            if step.next.is_empty() {
                debug!(
                    "{} {} answered {}",
                    evaluable.kind(),
                    evaluable.id().unwrap_or("-"),
                    answer
                );
                return Ok(Outcome {
                    answer: Some(answer),
                    next: Vec::new(),
                    visits,
                });
            }
            fallback = Some((answer, step.next.clone(), visits.len()));
        }

        for next in step.next.into_iter().rev() {
            queue.push_front(next);
        }
    }

    match fallback {
        Some((answer, next, len)) => {
            visits.truncate(len);
            debug!("no terminal answer, falling back to {}", answer);
            Ok(Outcome {
                answer: Some(answer),
                next,
                visits,
            })
        }
        None => Ok(Outcome::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_json_diff::assert_json_eq;
    use serde_json::json;
    use spectral::prelude::*;
    use std::cell::Cell;

    struct Node {
        name: &'static str,
        answer: Option<FlagValue>,
        children: Vec<Node>,
        fail: bool,
        calls: Cell<usize>,
    }

    impl Node {
        fn new(name: &'static str) -> Self {
            Node {
                name,
                answer: None,
                children: Vec::new(),
                fail: false,
                calls: Cell::new(0),
            }
        }

        fn answering(mut self, value: impl Into<FlagValue>) -> Self {
            self.answer = Some(value.into());
            self
        }

        fn with(mut self, children: Vec<Node>) -> Self {
            self.children = children;
            self
        }

        fn failing(mut self) -> Self {
            self.fail = true;
            self
        }

        fn child(&self, i: usize) -> &Node {
            &self.children[i]
        }
    }

    impl Evaluable for Node {
        fn evaluate<'a>(&'a self, _: &Attributes) -> Result<Step<'a>, Error> {
            self.calls.set(self.calls.get() + 1);
            if self.fail {
                return Err(Error::NoVariantToDistribute);
            }
            Ok(Step {
                answer: self.answer.as_ref(),
                next: self.children.iter().map(|c| c as &dyn Evaluable).collect(),
            })
        }

        fn kind(&self) -> &'static str {
            "Node"
        }

        fn id(&self) -> Option<&str> {
            Some(self.name)
        }
    }

    fn names(trace: &[Trace]) -> Vec<String> {
        trace.iter().filter_map(|t| t.id.clone()).collect()
    }

    #[test]
    fn root_answer_without_children_is_terminal() {
        let root = Node::new("root").answering("a");
        let outcome = evaluate(&Attributes::new(), &root).unwrap();
        assert_that!(outcome.answer).contains_value(&FlagValue::from("a"));
        assert_that!(names(&outcome.stack())).is_equal_to(vec!["root".to_string()]);
    }

    #[test]
    fn child_answer_wins_over_root_fallback() {
        let root = Node::new("root")
            .answering("default")
            .with(vec![Node::new("rule").with(vec![Node::new("dist").answering("v2")])]);
        let outcome = evaluate(&Attributes::new(), &root).unwrap();
        assert_that!(outcome.answer).contains_value(&FlagValue::from("v2"));
        assert_that!(names(&outcome.stack()))
            .is_equal_to(vec!["dist".to_string(), "rule".to_string(), "root".to_string()]);
    }

    #[test]
    fn fallback_when_no_child_answers() {
        let root = Node::new("root")
            .answering("default")
            .with(vec![Node::new("r1"), Node::new("r2")]);
        let outcome = evaluate(&Attributes::new(), &root).unwrap();
        assert_that!(outcome.answer).contains_value(&FlagValue::from("default"));
        assert_that!(outcome.next.len()).is_equal_to(2);
        assert_that!(names(&outcome.stack())).is_equal_to(vec!["root".to_string()]);
        assert_that!(root.child(0).calls.get()).is_equal_to(1);
        assert_that!(root.child(1).calls.get()).is_equal_to(1);
    }

    #[test]
    fn first_terminal_answer_stops_the_walk() {
        let root = Node::new("root").with(vec![
            Node::new("r1").answering(1),
            Node::new("r2").answering(2),
        ]);
        let outcome = evaluate(&Attributes::new(), &root).unwrap();
        assert_that!(outcome.answer).contains_value(&FlagValue::from(1));
        assert_that!(root.child(1).calls.get()).is_equal_to(0);
    }

    #[test]
    fn children_visited_before_queued_siblings() {
        let root = Node::new("root").with(vec![
            Node::new("r1").with(vec![Node::new("r1-dist").answering("deep")]),
            Node::new("r2").answering("shallow"),
        ]);
        let outcome = evaluate(&Attributes::new(), &root).unwrap();
        assert_that!(outcome.answer).contains_value(&FlagValue::from("deep"));
        assert_that!(root.child(1).calls.get()).is_equal_to(0);
    }

    #[test]
    fn later_fallback_replaces_earlier_one() {
        let root = Node::new("root")
            .answering("outer")
            .with(vec![Node::new("mid").answering("inner").with(vec![Node::new("leaf")])]);
        let outcome = evaluate(&Attributes::new(), &root).unwrap();
        assert_that!(outcome.answer).contains_value(&FlagValue::from("inner"));
        assert_that!(names(&outcome.stack()))
            .is_equal_to(vec!["mid".to_string(), "root".to_string()]);
    }

    #[test]
    fn error_aborts_the_walk() {
        let root = Node::new("root")
            .answering("default")
            .with(vec![Node::new("bad").failing(), Node::new("never").answering(1)]);
        let result = evaluate(&Attributes::new(), &root);
        assert_that!(result.err()).contains_value(Error::NoVariantToDistribute);
        assert_that!(root.child(1).calls.get()).is_equal_to(0);
    }

    #[test]
    fn no_answer_anywhere_is_empty() {
        let root = Node::new("root").with(vec![Node::new("r1")]);
        let outcome = evaluate(&Attributes::new(), &root).unwrap();
        assert_that!(outcome.answer).is_none();
        assert_that!(outcome.stack()).is_empty();
    }

    #[test]
    fn trace_serialization() {
        let trace = Trace {
            kind: "DistributionList",
            id: None,
            answer: Some(FlagValue::from(true)),
        };
        assert_json_eq!(
            serde_json::to_value(&trace).unwrap(),
            json!({"type": "DistributionList", "answer": true})
        );
    }
}
