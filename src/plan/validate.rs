//! Structural validation of plans before execution
//!
//! Planner output is untrusted. Every check here runs before the first step,
//! so a bad plan never executes partially.

use crate::core::error::{QueryError, Result};
use crate::functions::{Arity, FunctionLibrary, StepRole};
use crate::pipeline::ContextKind;
use crate::plan::Plan;

fn invalid(step: Option<usize>, reason: impl Into<String>) -> QueryError {
    QueryError::InvalidPlan {
        step,
        reason: reason.into(),
    }
}

/// Check a plan against the signatures registered in `library`
pub fn validate_plan(plan: &Plan, library: &FunctionLibrary) -> Result<()> {
    if plan.is_empty() {
        return Err(invalid(None, "plan has no steps"));
    }

    // Every name resolves before any structural check runs
    let signatures = plan
        .steps
        .iter()
        .enumerate()
        .map(|(index, step)| {
            library
                .get(&step.function)
                .map(|function| function.signature())
                .ok_or_else(|| QueryError::UnknownFunction {
                    index,
                    name: step.function.clone(),
                })
        })
        .collect::<Result<Vec<_>>>()?;

    let mut previous: Option<ContextKind> = None;
    let mut analysis_at: Option<usize> = None;
    let mut extraction_seen = false;
    let mut last_role = StepRole::Source;

    for (index, (step, sig)) in plan.steps.iter().zip(signatures).enumerate() {
        match (index, sig.arity) {
            (0, Arity::ContextConsuming) => {
                return Err(invalid(
                    Some(0),
                    format!("plan must start with a source step, not '{}'", sig.name),
                ));
            }
            (i, Arity::ContextFree) if i > 0 => {
                return Err(invalid(
                    Some(i),
                    format!("'{}' produces a fresh context and must be the first step", sig.name),
                ));
            }
            _ => {}
        }

        if let Some(missing) = sig
            .required_args
            .iter()
            .find(|name| step.args.get(**name).map_or(true, |v| v.is_null()))
        {
            return Err(invalid(
                Some(index),
                format!("'{}' requires argument '{}'", sig.name, missing),
            ));
        }

        match sig.role {
            StepRole::TextExtraction => extraction_seen = true,
            StepRole::Analysis => {
                if let Some(first) = analysis_at {
                    return Err(invalid(
                        Some(index),
                        format!("only one analysis step is allowed (first at step {})", first),
                    ));
                }
                if !extraction_seen {
                    return Err(invalid(
                        Some(index),
                        format!("'{}' must be preceded by a text extraction step", sig.name),
                    ));
                }
                analysis_at = Some(index);
            }
            _ => {}
        }

        if let Some(kind) = previous {
            if !sig.accepts_kind(kind) {
                return Err(invalid(
                    Some(index),
                    format!("'{}' cannot consume a {} context", sig.name, kind),
                ));
            }
        }

        previous = Some(sig.produces);
        last_role = sig.role;
    }

    if analysis_at.is_some() && last_role != StepRole::TextRender {
        return Err(invalid(
            Some(plan.len() - 1),
            "a plan with an analysis step must end with a text rendering step",
        ));
    }

    Ok(())
}
