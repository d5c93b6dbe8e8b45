use crate::{
    compiler::{Compiled, IntervalCompiler, IntervalProgram},
    config::Config,
    error::PredicateIndexError,
    index::{DocumentInfo, PredicateIndex},
    posting::{Posting, PostingList},
    predicate::Predicate,
    terms::TermTable,
    DocumentId,
};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// Accumulates compiled predicates until [`PredicateIndexBuilder::build`] seals
/// them into a [`PredicateIndex`].
pub struct PredicateIndexBuilder {
    config: Config,
    compiler: IntervalCompiler,
    terms: TermTable,
    postings: Vec<PostingList>,
    defaults: PostingList,
    zero_constraint: Vec<DocumentId>,
    documents: HashMap<DocumentId, DocumentInfo>,
    seen: HashSet<DocumentId>,
}

impl PredicateIndexBuilder {
    pub fn new(arity: u16) -> Result<Self, PredicateIndexError> {
        Config::new(arity).map(Self::with_config)
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            config,
            compiler: IntervalCompiler::new(config.arity()),
            terms: TermTable::new(),
            postings: vec![],
            defaults: PostingList::new(),
            zero_constraint: vec![],
            documents: HashMap::new(),
            seen: HashSet::new(),
        }
    }

    /// Compiles `predicate` and records its postings under `id`.
    ///
    /// A rejected call, whether for a duplicate id or a malformed predicate,
    /// leaves the builder untouched.
    pub fn index_document(
        &mut self,
        id: DocumentId,
        predicate: &Predicate,
    ) -> Result<(), PredicateIndexError> {
        if self.seen.contains(&id) {
            return Err(PredicateIndexError::DuplicateDocumentId(id));
        }
        let compiled = self.compiler.compile(predicate)?;
        self.seen.insert(id);

        match compiled {
            Compiled::Unconstrained => {
                debug!(doc_id = id, "indexed zero-constraint document");
                self.zero_constraint.push(id);
            }
            Compiled::Unsatisfiable => {
                debug!(doc_id = id, "predicate can never match, no postings recorded");
            }
            Compiled::Intervals(program) => self.insert(id, program),
        }
        Ok(())
    }

    fn insert(&mut self, doc_id: DocumentId, program: IntervalProgram) {
        self.documents.insert(
            doc_id,
            DocumentInfo {
                terminal: program.terminal,
                min_feature: program.min_feature,
                slots: program.slots,
            },
        );
        for (term, interval, exclusion) in program.postings {
            let id = self.terms.get_or_update(term);
            if id.index() == self.postings.len() {
                self.postings.push(PostingList::new());
            }
            self.postings[id.index()].push(Posting {
                doc_id,
                interval,
                exclusion,
            });
        }
        for (interval, slot) in program.defaults {
            self.defaults.push(Posting {
                doc_id,
                interval,
                exclusion: slot,
            });
        }
    }

    pub fn zero_constraint_doc_count(&self) -> u64 {
        self.zero_constraint.len() as u64
    }

    pub fn document_count(&self) -> u64 {
        self.seen.len() as u64
    }

    pub fn build(self) -> PredicateIndex {
        let Self {
            config,
            terms,
            mut postings,
            mut defaults,
            mut zero_constraint,
            documents,
            seen,
            ..
        } = self;

        postings.iter_mut().for_each(PostingList::sort);
        defaults.sort();
        zero_constraint.sort_unstable();

        info!(
            documents = seen.len(),
            zero_constraint = zero_constraint.len(),
            terms = terms.len(),
            arity = config.arity(),
            "built predicate index"
        );
        PredicateIndex {
            config,
            document_count: seen.len() as u64,
            terms,
            postings,
            defaults,
            zero_constraint,
            documents,
        }
    }
}
