//! Compiles a predicate tree into interval-labelled postings.
//!
//! The normalized tree is read as a series-parallel graph between boundary `0`
//! and a terminal boundary. A conjunction chains its operands through fresh
//! boundaries that belong to it alone; a disjunction routes every operand
//! between the same two boundaries. Each leaf becomes an edge, stored as the
//! interval `[from + 1, to]`. Boundaries are numbered so that every edge goes
//! upwards, which lets the searcher settle reachability in one pass over the
//! hit intervals sorted by `begin`: the document matches iff the terminal is
//! reachable from `0` through satisfied leaves.
use crate::{
    error::InvalidPredicateError,
    posting::Interval,
    predicate::Predicate,
    range::RangeEncoder,
    terms::Term,
};
use itertools::Itertools;
use slab::Slab;

#[derive(Debug, PartialEq)]
pub enum Compiled {
    /// Matches every query.
    Unconstrained,
    /// Never matches.
    Unsatisfiable,
    Intervals(IntervalProgram),
}

#[derive(Debug, Default, PartialEq)]
pub struct IntervalProgram {
    pub terminal: u32,
    /// Fewest positive leaves any satisfying query has to hit.
    pub min_feature: u32,
    /// Number of negated leaves; they are numbered `1..=slots`.
    pub slots: u32,
    /// `(term, interval, exclusion slot)`, the slot being zero for positive leaves.
    pub postings: Vec<(Term, Interval, u32)>,
    /// Intervals of negated leaves, satisfied unless one of their terms is hit.
    pub defaults: Vec<(Interval, u32)>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Operator {
    And,
    Or,
}

impl Operator {
    fn dual(self) -> Self {
        match self {
            Self::And => Self::Or,
            Self::Or => Self::And,
        }
    }

    /// The constant that decides the whole node once an operand evaluates to it.
    fn absorbing(self) -> bool {
        matches!(self, Self::Or)
    }
}

#[derive(Debug)]
enum Node {
    Operator {
        operator: Operator,
        operands: Vec<usize>,
    },
    Leaf {
        terms: Vec<Term>,
        negated: bool,
    },
}

enum Normalized {
    Constant(bool),
    Node(usize),
}

#[derive(Clone, Copy, Default)]
struct Annotation {
    /// Boundaries allocated strictly inside the node.
    inner: u64,
    min_feature: u32,
}

#[derive(Clone, Copy, Debug)]
pub struct IntervalCompiler {
    ranges: RangeEncoder,
}

impl IntervalCompiler {
    /// Deepest nesting of operators and negations a predicate may have.
    /// Normalization, annotation and labelling all recurse once per level.
    pub const MAX_DEPTH: usize = 256;

    pub fn new(arity: u16) -> Self {
        Self {
            ranges: RangeEncoder::new(arity),
        }
    }

    pub fn compile(&self, predicate: &Predicate) -> Result<Compiled, InvalidPredicateError> {
        let mut arena = Slab::new();
        let root = match self.normalize(predicate, false, 0, &mut arena)? {
            Normalized::Constant(true) => return Ok(Compiled::Unconstrained),
            Normalized::Constant(false) => return Ok(Compiled::Unsatisfiable),
            Normalized::Node(root) => root,
        };

        let mut annotations = vec![Annotation::default(); arena.capacity()];
        let annotation = annotate(&arena, root, &mut annotations);
        let terminal = annotation
            .inner
            .checked_add(1)
            .and_then(|terminal| u32::try_from(terminal).ok())
            .ok_or(InvalidPredicateError::TooComplex)?;

        let mut labeller = Labeller {
            arena: &arena,
            annotations: &annotations,
            next: 1,
            program: IntervalProgram {
                terminal,
                min_feature: annotation.min_feature,
                ..IntervalProgram::default()
            },
        };
        labeller.label(root, 0, terminal);
        Ok(Compiled::Intervals(labeller.program))
    }

    fn normalize(
        &self,
        predicate: &Predicate,
        negated: bool,
        depth: usize,
        arena: &mut Slab<Node>,
    ) -> Result<Normalized, InvalidPredicateError> {
        if depth > Self::MAX_DEPTH {
            return Err(InvalidPredicateError::TooComplex);
        }
        match predicate {
            Predicate::True => Ok(Normalized::Constant(!negated)),
            Predicate::False => Ok(Normalized::Constant(negated)),
            Predicate::Not(child) => self.normalize(child, !negated, depth + 1, arena),
            Predicate::FeatureSet { feature, values } => {
                if values.is_empty() {
                    return Err(InvalidPredicateError::EmptyValueSet(feature.clone()));
                }
                let terms = values
                    .iter()
                    .sorted()
                    .dedup()
                    .map(|value| Term::value(feature, value.clone()))
                    .collect();
                Ok(Normalized::Node(arena.insert(Node::Leaf { terms, negated })))
            }
            Predicate::FeatureRange { feature, from, to } => {
                let from = from.unwrap_or(i64::MIN);
                let to = to.unwrap_or(i64::MAX);
                if from > to {
                    return Err(InvalidPredicateError::InvertedRange {
                        feature: feature.clone(),
                        from,
                        to,
                    });
                }
                let terms = self
                    .ranges
                    .partitions(from, to)
                    .iter()
                    .map(|partition| partition.term(feature))
                    .collect();
                Ok(Normalized::Node(arena.insert(Node::Leaf { terms, negated })))
            }
            Predicate::And(children) => {
                self.normalize_operator(Operator::And, children, negated, depth, arena)
            }
            Predicate::Or(children) => {
                self.normalize_operator(Operator::Or, children, negated, depth, arena)
            }
        }
    }

    fn normalize_operator(
        &self,
        operator: Operator,
        children: &[Predicate],
        negated: bool,
        depth: usize,
        arena: &mut Slab<Node>,
    ) -> Result<Normalized, InvalidPredicateError> {
        if children.is_empty() {
            return Err(InvalidPredicateError::EmptyOperator);
        }
        let operator = if negated { operator.dual() } else { operator };

        let mut absorbed = false;
        let mut operands = Vec::with_capacity(children.len());
        // Malformed leaves are reported even behind an absorbing constant.
        for child in children {
            match self.normalize(child, negated, depth + 1, arena)? {
                Normalized::Constant(value) => absorbed |= value == operator.absorbing(),
                Normalized::Node(key) => {
                    let same = matches!(
                        &arena[key],
                        Node::Operator { operator: nested, .. } if *nested == operator
                    );
                    if !same {
                        operands.push(key);
                    } else if let Node::Operator {
                        operands: nested, ..
                    } = arena.remove(key)
                    {
                        operands.extend(nested);
                    }
                }
            }
        }

        if absorbed {
            return Ok(Normalized::Constant(operator.absorbing()));
        }
        match operands.len() {
            0 => Ok(Normalized::Constant(!operator.absorbing())),
            1 => Ok(Normalized::Node(operands[0])),
            _ => Ok(Normalized::Node(
                arena.insert(Node::Operator { operator, operands }),
            )),
        }
    }
}

fn annotate(arena: &Slab<Node>, key: usize, annotations: &mut [Annotation]) -> Annotation {
    let annotation = match &arena[key] {
        Node::Leaf { negated, .. } => Annotation {
            inner: 0,
            min_feature: u32::from(!negated),
        },
        Node::Operator {
            operator,
            operands,
        } => {
            let children: Vec<_> = operands
                .iter()
                .map(|&operand| annotate(arena, operand, annotations))
                .collect();
            let inner = children.iter().map(|child| child.inner).sum::<u64>();
            match operator {
                Operator::And => Annotation {
                    inner: inner + children.len() as u64 - 1,
                    min_feature: children
                        .iter()
                        .fold(0u32, |sum, child| sum.saturating_add(child.min_feature)),
                },
                Operator::Or => Annotation {
                    inner,
                    min_feature: children
                        .iter()
                        .map(|child| child.min_feature)
                        .min()
                        .unwrap_or_default(),
                },
            }
        }
    };
    annotations[key] = annotation;
    annotation
}

struct Labeller<'a> {
    arena: &'a Slab<Node>,
    annotations: &'a [Annotation],
    /// Next free boundary.
    next: u32,
    program: IntervalProgram,
}

impl Labeller<'_> {
    /// Routes `key` from boundary `from` to boundary `to`, consuming exactly
    /// `annotations[key].inner` fresh boundaries.
    fn label(&mut self, key: usize, from: u32, to: u32) {
        let arena = self.arena;
        match &arena[key] {
            Node::Leaf { terms, negated } => {
                let interval = Interval::new(from + 1, to);
                let slot = if *negated {
                    self.program.slots += 1;
                    self.program.defaults.push((interval, self.program.slots));
                    self.program.slots
                } else {
                    0
                };
                self.program.postings.extend(
                    terms
                        .iter()
                        .map(|term| (term.clone(), interval, slot)),
                );
            }
            Node::Operator {
                operator: Operator::Or,
                operands,
            } => {
                for &operand in operands {
                    self.label(operand, from, to);
                }
            }
            Node::Operator {
                operator: Operator::And,
                operands,
            } => {
                let last = operands.len() - 1;
                let mut start = from;
                for (i, &operand) in operands.iter().enumerate() {
                    if i == last {
                        self.label(operand, start, to);
                    } else {
                        // Bounded by the terminal.
                        let end = self.next + self.annotations[operand].inner as u32;
                        self.label(operand, start, end);
                        self.next = end + 1;
                        start = end;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::Value;

    fn compile(predicate: &Predicate) -> Compiled {
        IntervalCompiler::new(2).compile(predicate).unwrap()
    }

    fn program(predicate: &Predicate) -> IntervalProgram {
        match compile(predicate) {
            Compiled::Intervals(program) => program,
            other => panic!("expected intervals, got {other:?}"),
        }
    }

    fn value(feature: &str, value: &str) -> Term {
        Term::value(feature, Value::from(value))
    }

    #[test]
    fn can_compile_a_single_leaf() {
        let program = program(&Predicate::feature_set("country", ["no", "se", "no"]));

        assert_eq!(program.terminal, 1);
        assert_eq!(program.min_feature, 1);
        assert_eq!(
            program.postings,
            vec![
                (value("country", "no"), Interval::new(1, 1), 0),
                (value("country", "se"), Interval::new(1, 1), 0),
            ]
        );
        assert!(program.defaults.is_empty());
    }

    #[test]
    fn can_chain_the_operands_of_a_conjunction() {
        let program = program(&Predicate::and([
            Predicate::feature_set("a", ["x"]),
            Predicate::feature_set("b", ["y"]),
            Predicate::feature_set("c", ["z"]),
        ]));

        assert_eq!(program.terminal, 3);
        assert_eq!(program.min_feature, 3);
        assert_eq!(
            program.postings,
            vec![
                (value("a", "x"), Interval::new(1, 1), 0),
                (value("b", "y"), Interval::new(2, 2), 0),
                (value("c", "z"), Interval::new(3, 3), 0),
            ]
        );
    }

    #[test]
    fn give_each_disjunct_private_boundaries() {
        let program = program(&Predicate::or([
            Predicate::and([
                Predicate::feature_set("a", ["x"]),
                Predicate::feature_set("b", ["y"]),
            ]),
            Predicate::and([
                Predicate::feature_set("c", ["z"]),
                Predicate::feature_set("d", ["w"]),
            ]),
        ]));

        assert_eq!(program.terminal, 3);
        assert_eq!(program.min_feature, 2);
        assert_eq!(
            program.postings,
            vec![
                (value("a", "x"), Interval::new(1, 1), 0),
                (value("b", "y"), Interval::new(2, 3), 0),
                (value("c", "z"), Interval::new(1, 2), 0),
                (value("d", "w"), Interval::new(3, 3), 0),
            ]
        );
    }

    #[test]
    fn number_every_edge_upwards() {
        let program = program(&Predicate::and([
            Predicate::or([
                Predicate::and([
                    Predicate::feature_set("a", ["1"]),
                    Predicate::feature_set("b", ["2"]),
                ]),
                Predicate::feature_set("c", ["3"]),
            ]),
            Predicate::feature_set("d", ["4"]),
            Predicate::or([
                Predicate::feature_set("e", ["5"]),
                Predicate::and([
                    Predicate::feature_set("f", ["6"]),
                    Predicate::feature_not_in("g", ["7"]),
                ]),
            ]),
        ]));

        assert!(program
            .postings
            .iter()
            .all(|(_, interval, _)| 1 <= interval.begin
                && interval.begin <= interval.end
                && interval.end <= program.terminal));
        assert_eq!(program.min_feature, 3);
    }

    #[test]
    fn can_compile_a_negated_leaf() {
        let program = program(&Predicate::feature_not_in("a", ["x", "y"]));

        assert_eq!(program.terminal, 1);
        assert_eq!(program.min_feature, 0);
        assert_eq!(program.slots, 1);
        assert_eq!(program.defaults, vec![(Interval::new(1, 1), 1)]);
        assert_eq!(
            program.postings,
            vec![
                (value("a", "x"), Interval::new(1, 1), 1),
                (value("a", "y"), Interval::new(1, 1), 1),
            ]
        );
    }

    #[test]
    fn give_each_negated_leaf_its_own_slot() {
        let program = program(&Predicate::or([
            Predicate::feature_not_in("a", ["x"]),
            Predicate::feature_not_in("b", ["y"]),
        ]));

        assert_eq!(program.slots, 2);
        assert_eq!(
            program.defaults,
            vec![(Interval::new(1, 1), 1), (Interval::new(1, 1), 2)]
        );
    }

    #[test]
    fn can_push_negations_to_the_leaves() {
        let negated = Predicate::not(Predicate::and([
            Predicate::feature_set("a", ["x"]),
            Predicate::feature_set("b", ["y"]),
        ]));
        let expected = Predicate::or([
            Predicate::feature_not_in("a", ["x"]),
            Predicate::feature_not_in("b", ["y"]),
        ]);

        assert_eq!(compile(&negated), compile(&expected));
    }

    #[test]
    fn can_cancel_double_negations() {
        let predicate = Predicate::not(Predicate::not(Predicate::feature_set("a", ["x"])));

        assert_eq!(
            compile(&predicate),
            compile(&Predicate::feature_set("a", ["x"]))
        );
    }

    #[test]
    fn can_fold_constants() {
        assert_eq!(compile(&Predicate::True), Compiled::Unconstrained);
        assert_eq!(compile(&Predicate::False), Compiled::Unsatisfiable);
        assert_eq!(
            compile(&Predicate::not(Predicate::False)),
            Compiled::Unconstrained
        );
        assert_eq!(
            compile(&Predicate::and([
                Predicate::feature_set("a", ["x"]),
                Predicate::False
            ])),
            Compiled::Unsatisfiable
        );
        assert_eq!(
            compile(&Predicate::or([
                Predicate::feature_set("a", ["x"]),
                Predicate::True
            ])),
            Compiled::Unconstrained
        );
        assert_eq!(
            compile(&Predicate::and([Predicate::True, Predicate::True])),
            Compiled::Unconstrained
        );
        assert_eq!(
            compile(&Predicate::and([
                Predicate::True,
                Predicate::feature_set("a", ["x"])
            ])),
            compile(&Predicate::feature_set("a", ["x"]))
        );
    }

    #[test]
    fn can_flatten_nested_operators() {
        let nested = Predicate::and([
            Predicate::feature_set("a", ["x"]),
            Predicate::and([
                Predicate::feature_set("b", ["y"]),
                Predicate::feature_set("c", ["z"]),
            ]),
        ]);
        let flat = Predicate::and([
            Predicate::feature_set("a", ["x"]),
            Predicate::feature_set("b", ["y"]),
            Predicate::feature_set("c", ["z"]),
        ]);

        assert_eq!(compile(&nested), compile(&flat));
    }

    #[test]
    fn can_compile_a_range_into_partitions() {
        let program = program(&Predicate::feature_range("age", Some(3), Some(9)));

        assert_eq!(
            program.postings,
            vec![
                (Term::partition("age", 3, 3), Interval::new(1, 1), 0),
                (Term::partition("age", 4, 7), Interval::new(1, 1), 0),
                (Term::partition("age", 8, 9), Interval::new(1, 1), 0),
            ]
        );
    }

    #[test]
    fn return_an_error_on_an_empty_value_set() {
        let result = IntervalCompiler::new(2).compile(&Predicate::FeatureSet {
            feature: "a".to_owned(),
            values: vec![],
        });

        assert_eq!(
            result,
            Err(InvalidPredicateError::EmptyValueSet("a".to_owned()))
        );
    }

    #[test]
    fn return_an_error_on_an_inverted_range() {
        let result =
            IntervalCompiler::new(2).compile(&Predicate::feature_range("age", Some(40), Some(20)));

        assert!(matches!(
            result,
            Err(InvalidPredicateError::InvertedRange { from: 40, to: 20, .. })
        ));
    }

    #[test]
    fn return_an_error_on_an_empty_operator() {
        let result = IntervalCompiler::new(2).compile(&Predicate::Or(vec![]));

        assert_eq!(result, Err(InvalidPredicateError::EmptyOperator));
    }

    #[test]
    fn return_an_error_on_deeply_nested_predicates() {
        let mut predicate = Predicate::feature_set("a", ["x"]);
        for _ in 0..10_000 {
            predicate = Predicate::not(predicate);
        }

        let result = IntervalCompiler::new(2).compile(&predicate);

        assert_eq!(result, Err(InvalidPredicateError::TooComplex));
    }

    #[test]
    fn can_compile_predicates_nested_up_to_the_limit() {
        let mut predicate = Predicate::feature_set("a", ["x"]);
        for i in 0..IntervalCompiler::MAX_DEPTH {
            predicate = if i % 2 == 0 {
                Predicate::and([predicate, Predicate::feature_set("b", ["y"])])
            } else {
                Predicate::or([predicate, Predicate::feature_set("c", ["z"])])
            };
        }

        assert!(IntervalCompiler::new(2).compile(&predicate).is_ok());

        let deeper = Predicate::not(predicate);
        assert_eq!(
            IntervalCompiler::new(2).compile(&deeper),
            Err(InvalidPredicateError::TooComplex)
        );
    }

    #[test]
    fn report_malformed_leaves_behind_absorbing_constants() {
        let predicate = Predicate::and([
            Predicate::False,
            Predicate::FeatureSet {
                feature: "a".to_owned(),
                values: vec![],
            },
        ]);

        assert!(IntervalCompiler::new(2).compile(&predicate).is_err());
    }
}
