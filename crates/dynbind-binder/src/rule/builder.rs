use dynbind_core::TypeHash;

use super::{Computation, Guard, Rule, Strategy, TempId, Temporary};
use crate::request::{ConversionRequest, ResultKind};

/// Accumulates the outcome of resolving one request and produces one [`Rule`].
#[derive(Debug)]
pub struct RuleBuilder {
    kind: ResultKind,
    target_type: TypeHash,
    result_type: TypeHash,
    guard: Guard,
    temporaries: Vec<Temporary>,
    outcome: Option<(Strategy, Computation)>,
}

impl RuleBuilder {
    pub fn new(request: &ConversionRequest) -> Self {
        Self {
            kind: request.kind,
            target_type: request.target.hash,
            result_type: request.result_type,
            guard: Guard::always(),
            temporaries: Vec::new(),
            outcome: None,
        }
    }

    pub fn kind(&self) -> ResultKind {
        self.kind
    }

    /// Require the converted value to have exactly `runtime_type`.
    pub fn add_guard(&mut self, runtime_type: TypeHash) {
        self.guard.push(runtime_type);
    }

    /// Declare a temporary binding for the rule's computation.
    pub fn declare_temporary(&mut self, name: impl Into<String>, ty: TypeHash) -> TempId {
        let id = TempId(self.temporaries.len() as u32);
        self.temporaries.push(Temporary {
            id,
            name: name.into(),
            ty,
        });
        id
    }

    /// Record the computation to run when the guard passes.
    pub fn set_success(&mut self, strategy: Strategy, computation: Computation) {
        self.outcome = Some((strategy, computation));
    }

    /// Record the failure computation appropriate to the result kind.
    ///
    /// Cast kinds raise a no-conversion error; try kinds yield the sentinel.
    pub fn set_error(&mut self) {
        self.outcome = Some(self.error_outcome());
    }

    fn error_outcome(&self) -> (Strategy, Computation) {
        let computation = if self.kind.is_try() {
            self.try_sentinel()
        } else {
            Computation::throw_error(Computation::Input, self.target_type)
        };
        (Strategy::NoConversion, computation)
    }

    /// The value a failed try conversion produces.
    pub fn try_sentinel(&self) -> Computation {
        Computation::ReturnSentinel(self.result_type)
    }

    pub fn has_outcome(&self) -> bool {
        self.outcome.is_some()
    }

    /// Produce the rule, stamped with the catalog version it was resolved under.
    ///
    /// A builder with no recorded outcome produces the error rule.
    pub fn build(mut self, catalog_version: u64) -> Rule {
        let (strategy, target) = match self.outcome.take() {
            Some(outcome) => outcome,
            None => self.error_outcome(),
        };
        Rule {
            guard: self.guard,
            target,
            temporaries: self.temporaries,
            strategy,
            kind: self.kind,
            catalog_version,
        }
    }
}
