//! Step-by-step collection of calculation inputs.
//!
//! Each user walks an ordered list of [`FIELDS`]. Every answer is parsed and
//! range-checked before it is stored; a rejected answer re-asks the same
//! question without losing progress. After the last field the pricing engine
//! runs, the report is returned and the session is dropped.
//!
//! ```text
//!  NoSession ──start──▶ Collecting(0) ──ok──▶ … ──ok──▶ Collecting(13) ──ok──▶ NoSession
//!                          │  ▲                                                (report)
//!                          └──┘ invalid answer
//! ```

mod fields;
mod session;
mod store;

pub use fields::{FIELDS, FieldKey, FieldKind, FieldSpec, FieldValue, ValidationError, field_at};
pub use session::{CalcSession, ItemCalcBuilder};
pub use store::{InMemorySessionStore, SessionStore};

use std::sync::Arc;

use crate::error::{CalcError, Result};
use crate::pricing::{ComputationResult, ItemCalcInput, PricingEngine, format_report};

/// What happened to a submitted answer.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Answer stored; ask the next question.
    NextPrompt { prompt: &'static str },
    /// Answer rejected; ask the same question again.
    Invalid {
        error: ValidationError,
        prompt: &'static str,
    },
    /// Last answer stored and the calculation is done.
    Completed {
        input: ItemCalcInput,
        result: ComputationResult,
        report: String,
    },
}

impl SubmitOutcome {
    /// Reply message for the user.
    pub fn text(&self) -> String {
        match self {
            SubmitOutcome::NextPrompt { prompt } => prompt.to_string(),
            SubmitOutcome::Invalid { error, prompt } => {
                format!("{} Попробуйте ещё раз.\n{}", error, prompt)
            }
            SubmitOutcome::Completed { report, .. } => report.clone(),
        }
    }
}

/// Drives users through the questionnaire.
pub struct InputCollector {
    store: Arc<dyn SessionStore>,
}

impl InputCollector {
    /// Create a collector over the given session store.
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    /// Begin a new calculation, discarding any unfinished one.
    ///
    /// Returns the prompt for the first field.
    pub fn start(&self, user_id: &str) -> &'static str {
        self.store.set(user_id, CalcSession::new());
        tracing::info!(user_id, "Calculation started");
        FIELDS[0].prompt
    }

    /// Feed the next answer.
    ///
    /// Fails only when the user has no calculation in progress.
    pub fn submit(&self, user_id: &str, raw: &str) -> Result<SubmitOutcome> {
        let mut session = self
            .store
            .get(user_id)
            .ok_or_else(|| CalcError::NoActiveSession {
                user_id: user_id.to_string(),
            })?;

        let Some(field) = session.current_field() else {
            return self.complete(user_id, &session);
        };

        match field.parse(raw) {
            Ok(value) => match session.accept(value) {
                Some(next) => {
                    self.store.set(user_id, session);
                    Ok(SubmitOutcome::NextPrompt {
                        prompt: next.prompt,
                    })
                }
                None => self.complete(user_id, &session),
            },
            Err(error) => {
                tracing::debug!(user_id, field = %field.key, %error, "Answer rejected");
                session.touch();
                self.store.set(user_id, session);
                Ok(SubmitOutcome::Invalid {
                    error,
                    prompt: field.prompt,
                })
            }
        }
    }

    /// Abandon the user's calculation. Returns whether one was in progress.
    pub fn cancel(&self, user_id: &str) -> bool {
        let existed = self.store.clear(user_id);
        if existed {
            tracing::info!(user_id, "Calculation cancelled");
        }
        existed
    }

    /// Field the user is expected to answer next.
    pub fn current_field(&self, user_id: &str) -> Option<&'static FieldSpec> {
        self.store
            .get(user_id)
            .and_then(|session| session.current_field())
    }

    fn complete(&self, user_id: &str, session: &CalcSession) -> Result<SubmitOutcome> {
        self.store.clear(user_id);

        let input = session.finish()?;
        let result = PricingEngine::compute(&input);
        let report = format_report(&input, &result);

        tracing::info!(
            user_id,
            product = %input.name,
            profit_per_sold = %result.profit_per_sold,
            "Calculation completed"
        );

        Ok(SubmitOutcome::Completed {
            input,
            result,
            report,
        })
    }
}
