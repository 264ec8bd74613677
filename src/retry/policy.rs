use std::error::Error;
use std::fmt;
use std::sync::Arc;

use super::ErrorAction;
use crate::handlers::HandlerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Specificity {
    Any,
    Type,
    Filtered,
}

type Predicate = Arc<dyn Fn(&HandlerError) -> bool + Send + Sync>;

/// Predicate over a handler failure.
///
/// Type matches downcast the failure to a concrete error type; filtered
/// matches additionally look at the failure's details.
#[derive(Clone)]
pub struct FailureMatch {
    description: String,
    specificity: Specificity,
    predicate: Predicate,
}

impl FailureMatch {
    /// Matches every failure.
    pub fn any() -> Self {
        Self {
            description: "any failure".to_string(),
            specificity: Specificity::Any,
            predicate: Arc::new(|_| true),
        }
    }

    /// Matches failures of error type `E`.
    pub fn of<E: Error + 'static>() -> Self {
        Self {
            description: std::any::type_name::<E>().to_string(),
            specificity: Specificity::Type,
            predicate: Arc::new(|failure| failure.downcast_ref::<E>().is_some()),
        }
    }

    /// Matches failures of error type `E` accepted by `filter`.
    pub fn when<E, F>(filter: F) -> Self
    where
        E: Error + 'static,
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        Self {
            description: format!("{} (filtered)", std::any::type_name::<E>()),
            specificity: Specificity::Filtered,
            predicate: Arc::new(move |failure| failure.downcast_ref::<E>().is_some_and(|e| filter(e))),
        }
    }

    /// Matches failures whose message contains `text`.
    pub fn message_contains(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            description: format!("message contains '{}'", text),
            specificity: Specificity::Filtered,
            predicate: Arc::new(move |failure| failure.to_string().contains(&text)),
        }
    }

    /// Matches handlers that exceeded the hard execution deadline.
    pub fn timeout() -> Self {
        Self {
            description: "execution timeout".to_string(),
            specificity: Specificity::Type,
            predicate: Arc::new(|failure| matches!(failure, HandlerError::Timeout(_))),
        }
    }

    pub fn matches(&self, failure: &HandlerError) -> bool {
        (self.predicate)(failure)
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

impl fmt::Debug for FailureMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FailureMatch")
            .field("description", &self.description)
            .field("specificity", &self.specificity)
            .finish()
    }
}

/// One `(failure match, action)` pair.
#[derive(Debug, Clone)]
pub struct RetryRule {
    pub matcher: FailureMatch,
    pub action: ErrorAction,
}

/// Ordered failure → action rules.
#[derive(Debug, Clone, Default)]
pub struct RetryPolicy {
    rules: Vec<RetryRule>,
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, matcher: FailureMatch, action: ErrorAction) -> Self {
        self.add(matcher, action);
        self
    }

    pub fn add(&mut self, matcher: FailureMatch, action: ErrorAction) {
        self.rules.push(RetryRule { matcher, action });
    }

    pub fn rules(&self) -> &[RetryRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// The most specific matching rule; ties go to the earliest registered.
    pub fn find(&self, failure: &HandlerError) -> Option<&RetryRule> {
        self.rules
            .iter()
            .filter(|rule| rule.matcher.matches(failure))
            .fold(None, |best: Option<&RetryRule>, rule| match best {
                Some(b) if b.matcher.specificity >= rule.matcher.specificity => Some(b),
                _ => Some(rule),
            })
    }
}

/// Decide the action for a failed attempt.
///
/// `attempts` includes the attempt that just failed. Reaching
/// `maximum_attempts` always dead-letters; otherwise the chain's rules are
/// consulted, then the global rules, and an unmatched failure is requeued.
pub fn determine_action(
    failure: &HandlerError,
    attempts: u32,
    maximum_attempts: u32,
    chain: &RetryPolicy,
    global: &RetryPolicy,
) -> ErrorAction {
    if attempts >= maximum_attempts {
        return ErrorAction::MoveToErrorQueue;
    }

    chain
        .find(failure)
        .or_else(|| global.find(failure))
        .map(|rule| rule.action)
        .unwrap_or(ErrorAction::Requeue)
}
