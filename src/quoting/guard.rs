//! Optimistic concurrency guard for quotes.
//!
//! Every mutation runs as one atomic unit of work:
//!
//! ```text
//! read quote → exists? → owner? → status allows op? → version matches?
//!     → apply change, version + 1, stamp audit fields → write → commit
//! ```
//!
//! The version comparison and the write share a transaction, so two callers
//! holding the same version cannot both succeed. Conflicts are returned to
//! the caller and never retried here.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult, PersistenceFailure};
use crate::observability::metrics;
use crate::quoting::state::{check_owner, check_transition};
use crate::quoting::types::{Agent, NewQuote, Operation, Quote, QuotePatch};
use crate::storage::{run_atomic, Database, MemoryDatabase, QuoteStore, DEFAULT_TRANSACTION_TIMEOUT};

/// Sole writer path for quotes.
pub struct QuoteGuard<D = MemoryDatabase> {
    db: Arc<D>,
    timeout: Duration,
}

impl<D> Clone for QuoteGuard<D> {
    fn clone(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
            timeout: self.timeout,
        }
    }
}

impl<D: Database> QuoteGuard<D> {
    pub fn new(db: Arc<D>) -> Self {
        Self {
            db,
            timeout: DEFAULT_TRANSACTION_TIMEOUT,
        }
    }

    /// Bound applied to every transaction this guard opens.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn database(&self) -> &Arc<D> {
        &self.db
    }

    pub async fn register_agent(&self, agent: Agent) -> CoreResult<Agent> {
        run_atomic(self.db.as_ref(), self.timeout, move |tx| {
            Box::pin(async move {
                tx.insert_agent(agent.clone())?;
                Ok(agent)
            })
        })
        .await
    }

    /// Create a DRAFT quote at version 1.
    pub async fn create_quote(&self, new_quote: NewQuote) -> CoreResult<Quote> {
        new_quote.validate()?;
        let quote = new_quote.into_quote(Utc::now());

        let created = run_atomic(self.db.as_ref(), self.timeout, move |tx| {
            Box::pin(async move {
                let existing = tx.find_quote(quote.id)?;
                check_operation(existing.as_ref(), quote.id, Operation::Create, None)?;
                tx.insert_quote(quote.clone())?;
                Ok(quote)
            })
        })
        .await?;

        tracing::info!(
            quote_id = %created.id,
            reference = %created.reference,
            agent_id = %created.agent_id,
            "Quote created"
        );
        Ok(created)
    }

    /// Fresh read of the committed quote.
    pub async fn get_quote(&self, id: Uuid) -> CoreResult<Quote> {
        run_atomic(self.db.as_ref(), self.timeout, move |tx| {
            Box::pin(async move { tx.find_quote(id)?.ok_or_else(|| CoreError::not_found("Quote", id)) })
        })
        .await
    }

    /// Check that `operation` is legal for the quote's current status and
    /// that `acting_agent`, when given, owns it.
    ///
    /// For [`Operation::Create`] the check passes only when no quote with
    /// this id exists yet.
    pub async fn validate_state(&self, id: Uuid, operation: Operation, acting_agent: Option<&str>) -> CoreResult<()> {
        let acting = acting_agent.map(str::to_owned);
        run_atomic(self.db.as_ref(), self.timeout, move |tx| {
            Box::pin(async move {
                let existing = tx.find_quote(id)?;
                check_operation(existing.as_ref(), id, operation, acting.as_deref())
            })
        })
        .await
    }

    /// Apply `patch` if the stored version still equals `expected_version`.
    ///
    /// Updating a REJECTED quote reopens it as DRAFT.
    pub async fn update_with_version(
        &self,
        id: Uuid,
        expected_version: u64,
        patch: QuotePatch,
        acting_agent: Option<&str>,
    ) -> CoreResult<Quote> {
        patch.validate()?;
        let updated = self
            .mutate(id, expected_version, Operation::Update, acting_agent, move |quote, _| {
                patch.apply_to(quote)
            })
            .await?;

        tracing::info!(quote_id = %id, version = updated.version, status = %updated.status, "Quote updated");
        Ok(updated)
    }

    /// Move a DRAFT quote to SENT and stamp `sent_at`.
    pub async fn send_quote(&self, id: Uuid, expected_version: u64, acting_agent: Option<&str>) -> CoreResult<Quote> {
        let sent = self
            .mutate(id, expected_version, Operation::Send, acting_agent, |quote, now| {
                quote.sent_at = Some(now);
            })
            .await?;

        tracing::info!(quote_id = %id, version = sent.version, "Quote sent");
        Ok(sent)
    }

    pub async fn delete_quote(&self, id: Uuid, expected_version: u64, acting_agent: Option<&str>) -> CoreResult<()> {
        let acting = acting_agent.map(str::to_owned);
        run_atomic(self.db.as_ref(), self.timeout, move |tx| {
            Box::pin(async move {
                let existing = tx.find_quote(id)?;
                check_operation(existing.as_ref(), id, Operation::Delete, acting.as_deref())?;
                if let Some(quote) = &existing {
                    check_version(quote, expected_version)?;
                }
                if !tx.delete_quote(id)? {
                    return Err(CoreError::not_found("Quote", id));
                }
                Ok(())
            })
        })
        .await?;

        tracing::info!(quote_id = %id, "Quote deleted");
        Ok(())
    }

    async fn mutate<A>(
        &self,
        id: Uuid,
        expected_version: u64,
        operation: Operation,
        acting_agent: Option<&str>,
        apply: A,
    ) -> CoreResult<Quote>
    where
        A: FnOnce(&mut Quote, DateTime<Utc>) + Send + 'static,
    {
        let acting = acting_agent.map(str::to_owned);
        run_atomic(self.db.as_ref(), self.timeout, move |tx| {
            Box::pin(async move {
                let existing = tx.find_quote(id)?;
                check_operation(existing.as_ref(), id, operation, acting.as_deref())?;
                let Some(mut quote) = existing else {
                    return Err(CoreError::not_found("Quote", id));
                };
                check_version(&quote, expected_version)?;

                let now = Utc::now();
                quote.status = quote.status.after(operation);
                apply(&mut quote, now);
                quote.version += 1;
                quote.updated_at = now;
                quote.updated_by = acting.unwrap_or_else(|| quote.agent_id.clone());

                tx.update_quote(quote.clone())?;
                Ok(quote)
            })
        })
        .await
    }
}

/// Ownership and transition rules for `operation` against the stored row.
fn check_operation(
    existing: Option<&Quote>,
    id: Uuid,
    operation: Operation,
    acting_agent: Option<&str>,
) -> CoreResult<()> {
    match (existing, operation) {
        (None, Operation::Create) => Ok(()),
        (Some(_), Operation::Create) => Err(CoreError::PersistenceFailed(PersistenceFailure::Duplicate {
            constraint: "quotes_pkey",
        })),
        (None, _) => Err(CoreError::not_found("Quote", id)),
        (Some(quote), operation) => {
            check_owner(quote, acting_agent)?;
            check_transition(quote, operation)
        }
    }
}

fn check_version(quote: &Quote, expected_version: u64) -> CoreResult<()> {
    if quote.version != expected_version {
        tracing::info!(
            quote_id = %quote.id,
            expected = expected_version,
            actual = quote.version,
            "Version conflict"
        );
        metrics::record_version_conflict("quote");
        return Err(CoreError::VersionConflict {
            expected: expected_version,
            actual: quote.version,
        });
    }
    Ok(())
}
