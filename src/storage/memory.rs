//! In-process transactional store.
//!
//! Transactions are serialized on a single async lock: `begin` acquires it,
//! copies the committed tables into a staging area, and commit publishes the
//! staging area back. Dropping a transaction discards its staged writes.
//! Constraints are checked on every write the way a relational backend
//! would, and reported with the same constraint names.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::quoting::types::{Agent, Quote};
use crate::storage::{Database, DbError, QuoteStore};

#[derive(Debug, Clone, Default)]
struct Tables {
    agents: HashMap<String, Agent>,
    quotes: HashMap<Uuid, Quote>,
}

/// Shared in-memory database.
#[derive(Debug)]
pub struct MemoryDatabase {
    tables: Arc<Mutex<Tables>>,
    online: AtomicBool,
}

impl Default for MemoryDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self {
            tables: Arc::new(Mutex::new(Tables::default())),
            online: AtomicBool::new(true),
        }
    }

    /// Simulate the backend going away (or coming back).
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
        tracing::info!(online, "Memory database availability changed");
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Committed state of a quote, read outside any transaction.
    pub async fn committed_quote(&self, id: Uuid) -> Option<Quote> {
        self.tables.lock().await.quotes.get(&id).cloned()
    }

    pub async fn quote_count(&self) -> usize {
        self.tables.lock().await.quotes.len()
    }
}

impl Database for MemoryDatabase {
    type Tx = MemoryTransaction;

    fn begin(&self, max_wait: Duration) -> impl Future<Output = Result<MemoryTransaction, DbError>> + Send {
        let tables = Arc::clone(&self.tables);
        let online = self.is_online();
        async move {
            if !online {
                return Err(DbError::ConnectionInit("memory database is offline".into()));
            }
            let guard = tokio::time::timeout(max_wait, tables.lock_owned())
                .await
                .map_err(|_| DbError::Timeout(max_wait))?;
            let staged = (*guard).clone();
            Ok(MemoryTransaction {
                guard,
                staged,
                dirty: false,
            })
        }
    }

    fn commit(&self, tx: MemoryTransaction) -> impl Future<Output = Result<(), DbError>> + Send {
        async move {
            tx.publish();
            Ok(())
        }
    }
}

/// Open transaction on a [`MemoryDatabase`]. Holds the database lock.
pub struct MemoryTransaction {
    guard: OwnedMutexGuard<Tables>,
    staged: Tables,
    dirty: bool,
}

impl MemoryTransaction {
    fn publish(self) {
        let MemoryTransaction {
            mut guard,
            staged,
            dirty,
        } = self;
        if dirty {
            *guard = staged;
        }
    }

    fn check_quote_row(&self, quote: &Quote) -> Result<(), DbError> {
        require("reference", &quote.reference)?;
        require("agent_id", &quote.agent_id)?;
        require("title", &quote.title)?;
        require("client_email", &quote.client_email)?;

        if !self.staged.agents.contains_key(&quote.agent_id) {
            return Err(DbError::ForeignKeyViolation {
                constraint: "quotes_agent_id_fkey",
            });
        }

        let reference_taken = self
            .staged
            .quotes
            .values()
            .any(|other| other.id != quote.id && other.reference == quote.reference);
        if reference_taken {
            return Err(DbError::UniqueViolation {
                constraint: "quotes_reference_key",
            });
        }
        Ok(())
    }
}

fn require(column: &'static str, value: &str) -> Result<(), DbError> {
    if value.trim().is_empty() {
        return Err(DbError::NotNullViolation { column });
    }
    Ok(())
}

impl QuoteStore for MemoryTransaction {
    fn find_agent(&self, id: &str) -> Result<Option<Agent>, DbError> {
        Ok(self.staged.agents.get(id).cloned())
    }

    fn insert_agent(&mut self, agent: Agent) -> Result<(), DbError> {
        require("id", &agent.id)?;
        require("name", &agent.name)?;
        if self.staged.agents.contains_key(&agent.id) {
            return Err(DbError::UniqueViolation {
                constraint: "agents_pkey",
            });
        }
        self.staged.agents.insert(agent.id.clone(), agent);
        self.dirty = true;
        Ok(())
    }

    fn find_quote(&self, id: Uuid) -> Result<Option<Quote>, DbError> {
        Ok(self.staged.quotes.get(&id).cloned())
    }

    fn insert_quote(&mut self, quote: Quote) -> Result<(), DbError> {
        if self.staged.quotes.contains_key(&quote.id) {
            return Err(DbError::UniqueViolation {
                constraint: "quotes_pkey",
            });
        }
        self.check_quote_row(&quote)?;
        self.staged.quotes.insert(quote.id, quote);
        self.dirty = true;
        Ok(())
    }

    fn update_quote(&mut self, quote: Quote) -> Result<(), DbError> {
        if !self.staged.quotes.contains_key(&quote.id) {
            return Err(DbError::Other(format!("record to update not found: quote {}", quote.id)));
        }
        self.check_quote_row(&quote)?;
        self.staged.quotes.insert(quote.id, quote);
        self.dirty = true;
        Ok(())
    }

    fn delete_quote(&mut self, id: Uuid) -> Result<bool, DbError> {
        let removed = self.staged.quotes.remove(&id).is_some();
        self.dirty |= removed;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quoting::types::NewQuote;
    use chrono::Utc;

    const WAIT: Duration = Duration::from_secs(1);

    fn agent(id: &str) -> Agent {
        Agent {
            id: id.into(),
            name: format!("Agent {}", id),
        }
    }

    fn quote(agent_id: &str, reference: &str) -> Quote {
        NewQuote {
            agent_id: agent_id.into(),
            title: "Tokyo in spring".into(),
            client_email: "client@example.com".into(),
            total_cents: 350_000,
            currency: "JPY".into(),
            notes: None,
            reference: Some(reference.into()),
        }
        .into_quote(Utc::now())
    }

    #[tokio::test]
    async fn test_commit_publishes_writes() {
        let db = MemoryDatabase::new();
        let mut tx = db.begin(WAIT).await.unwrap();
        tx.insert_agent(agent("a1")).unwrap();
        let q = quote("a1", "Q-1");
        tx.insert_quote(q.clone()).unwrap();
        db.commit(tx).await.unwrap();

        assert_eq!(db.committed_quote(q.id).await, Some(q));
    }

    #[tokio::test]
    async fn test_drop_discards_writes() {
        let db = MemoryDatabase::new();
        {
            let mut tx = db.begin(WAIT).await.unwrap();
            tx.insert_agent(agent("a1")).unwrap();
            tx.insert_quote(quote("a1", "Q-1")).unwrap();
        }
        assert_eq!(db.quote_count().await, 0);
    }

    #[tokio::test]
    async fn test_constraints() {
        let db = MemoryDatabase::new();
        let mut tx = db.begin(WAIT).await.unwrap();
        tx.insert_agent(agent("a1")).unwrap();

        assert_eq!(
            tx.insert_agent(agent("a1")),
            Err(DbError::UniqueViolation { constraint: "agents_pkey" })
        );
        assert_eq!(
            tx.insert_quote(quote("ghost", "Q-1")),
            Err(DbError::ForeignKeyViolation {
                constraint: "quotes_agent_id_fkey"
            })
        );

        tx.insert_quote(quote("a1", "Q-1")).unwrap();
        assert_eq!(
            tx.insert_quote(quote("a1", "Q-1")),
            Err(DbError::UniqueViolation {
                constraint: "quotes_reference_key"
            })
        );

        let mut blank = quote("a1", "Q-2");
        blank.client_email = "  ".into();
        assert_eq!(
            tx.insert_quote(blank),
            Err(DbError::NotNullViolation { column: "client_email" })
        );
    }

    #[tokio::test]
    async fn test_offline_begin_fails() {
        let db = MemoryDatabase::new();
        db.set_online(false);
        assert!(matches!(db.begin(WAIT).await, Err(DbError::ConnectionInit(_))));
        db.set_online(true);
        assert!(db.begin(WAIT).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_begin_waits_for_open_transaction() {
        let db = MemoryDatabase::new();
        let _held = db.begin(WAIT).await.unwrap();
        let result = db.begin(Duration::from_millis(50)).await;
        assert_eq!(result.err(), Some(DbError::Timeout(Duration::from_millis(50))));
    }
}
