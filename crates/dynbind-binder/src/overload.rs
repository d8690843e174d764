//! Overload selection driven by the conversion cascade.
//!
//! Each candidate is checked argument by argument: an exact type match costs nothing,
//! any other argument is resolved as an implicit cast and costed by the strategy that
//! committed. The cheapest viable candidate wins; a tie goes to the candidate with more
//! exact matches, and a remaining tie is reported as ambiguous.

use dynbind_core::{OverloadError, TypeHash, TypeShape};
use dynbind_registry::TypeRegistry;

use crate::request::{ConversionRequest, ResultKind};
use crate::resolver::ConversionResolver;
use crate::rule::Strategy;

/// A callable overload: a display name and its parameter types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverloadCandidate {
    pub name: String,
    pub params: Vec<TypeHash>,
}

impl OverloadCandidate {
    pub fn new(name: impl Into<String>, params: Vec<TypeHash>) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }
}

/// How one argument converts to its parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArgConversion {
    /// The committing strategy, or `None` for an exact match.
    pub strategy: Option<Strategy>,
    pub cost: u32,
}

impl ArgConversion {
    pub const COST_EXACT: u32 = 0;
    pub const COST_NULL_TO_REFERENCE: u32 = 1;
    pub const COST_NUMERIC_WIDENING: u32 = 2;
    pub const COST_EXTENSIBLE_UNWRAP: u32 = 3;
    pub const COST_DERIVED_TO_BASE: u32 = 5;
    pub const COST_CLASS_TO_INTERFACE: u32 = 6;
    pub const COST_BOXING: u32 = 7;
    pub const COST_NULLABLE: u32 = 8;
    pub const COST_ENUMERABLE: u32 = 9;
    pub const COST_USER_DEFINED: u32 = 10;
    pub const COST_COM_INTERFACE: u32 = 12;
    pub const COST_DELEGATE: u32 = 20;

    pub fn exact() -> Self {
        Self {
            strategy: None,
            cost: Self::COST_EXACT,
        }
    }

    fn via(strategy: Strategy, to: &TypeShape) -> Self {
        let cost = match strategy {
            Strategy::NullToReference => Self::COST_NULL_TO_REFERENCE,
            Strategy::NumericWidening => Self::COST_NUMERIC_WIDENING,
            Strategy::ExtensibleUnwrap => Self::COST_EXTENSIBLE_UNWRAP,
            Strategy::Assignable if to.is_interface() => Self::COST_CLASS_TO_INTERFACE,
            Strategy::Assignable => Self::COST_DERIVED_TO_BASE,
            Strategy::ToObject => Self::COST_BOXING,
            Strategy::Nullable => Self::COST_NULLABLE,
            Strategy::Enumerable => Self::COST_ENUMERABLE,
            Strategy::UserDefined => Self::COST_USER_DEFINED,
            Strategy::ComInterface => Self::COST_COM_INTERFACE,
            Strategy::Delegate => Self::COST_DELEGATE,
            Strategy::NoConversion => u32::MAX,
        };
        Self {
            strategy: Some(strategy),
            cost,
        }
    }

    pub fn is_exact(&self) -> bool {
        self.strategy.is_none()
    }
}

/// The selected overload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverloadMatch {
    /// Index into the candidate list.
    pub index: usize,
    pub conversions: Vec<ArgConversion>,
    /// Sum of the argument costs (lower is better).
    pub total_cost: u32,
}

/// Select the best candidate for `arg_types`.
pub fn select_overload(
    resolver: &ConversionResolver<'_>,
    registry: &TypeRegistry,
    candidates: &[OverloadCandidate],
    arg_types: &[TypeHash],
) -> Result<OverloadMatch, OverloadError> {
    if candidates.is_empty() {
        return Err(OverloadError::NoCandidates);
    }

    let viable: Vec<OverloadMatch> = candidates
        .iter()
        .enumerate()
        .filter(|(_, c)| c.params.len() == arg_types.len())
        .filter_map(|(index, c)| match_candidate(resolver, registry, index, c, arg_types))
        .collect();

    if viable.is_empty() {
        let args: Vec<String> = arg_types.iter().map(|&t| registry.name_of(t)).collect();
        return Err(OverloadError::NoMatch {
            name: candidates[0].name.clone(),
            args: args.join(", "),
        });
    }

    find_best_match(&viable, candidates, registry)
}

fn match_candidate(
    resolver: &ConversionResolver<'_>,
    registry: &TypeRegistry,
    index: usize,
    candidate: &OverloadCandidate,
    arg_types: &[TypeHash],
) -> Option<OverloadMatch> {
    let mut conversions = Vec::with_capacity(arg_types.len());
    for (&arg, &param) in arg_types.iter().zip(&candidate.params) {
        if arg == param {
            conversions.push(ArgConversion::exact());
            continue;
        }
        let from = registry.get(arg)?;
        let to = registry.get(param)?;
        let request = ConversionRequest::new(from.clone(), to.clone(), ResultKind::ImplicitCast);
        let rule = resolver.resolve(&request, &from);
        if rule.is_error() {
            return None;
        }
        conversions.push(ArgConversion::via(rule.strategy(), &to));
    }
    let total_cost = conversions.iter().map(|c| c.cost).sum();
    Some(OverloadMatch {
        index,
        conversions,
        total_cost,
    })
}

fn find_best_match(
    viable: &[OverloadMatch],
    candidates: &[OverloadCandidate],
    registry: &TypeRegistry,
) -> Result<OverloadMatch, OverloadError> {
    let mut sorted: Vec<&OverloadMatch> = viable.iter().collect();
    // Stable sort keeps declaration order among equal costs
    sorted.sort_by_key(|m| m.total_cost);

    let best = sorted[0];
    let Some(&second) = sorted.get(1) else {
        return Ok(best.clone());
    };
    if best.total_cost < second.total_cost {
        return Ok(best.clone());
    }

    let tied: Vec<&OverloadMatch> = sorted
        .iter()
        .copied()
        .filter(|m| m.total_cost == best.total_cost)
        .collect();
    let most_exact = tied.iter().map(|m| exact_count(m)).max().unwrap_or(0);
    let winners: Vec<&OverloadMatch> = tied
        .into_iter()
        .filter(|m| exact_count(m) == most_exact)
        .collect();

    match winners.as_slice() {
        [only] => Ok((*only).clone()),
        _ => Err(ambiguous_overload_error(&winners, candidates, registry)),
    }
}

fn exact_count(m: &OverloadMatch) -> usize {
    m.conversions.iter().filter(|c| c.is_exact()).count()
}

fn ambiguous_overload_error(
    winners: &[&OverloadMatch],
    candidates: &[OverloadCandidate],
    registry: &TypeRegistry,
) -> OverloadError {
    let format_candidate = |m: &OverloadMatch| -> String {
        let candidate = &candidates[m.index];
        let params: Vec<String> = candidate
            .params
            .iter()
            .map(|&p| registry.name_of(p))
            .collect();
        format!("{}({})", candidate.name, params.join(", "))
    };
    let listed: Vec<String> = winners.iter().map(|m| format_candidate(m)).collect();
    OverloadError::Ambiguous {
        name: candidates[winners[0].index].name.clone(),
        candidates: listed.join(" and "),
    }
}
