//! Transaction Management
//!
//! Scoped transactions over a session. A `Transaction` opened while
//! another is active joins it; only the outermost scope talks to the
//! storage. Dropping an uncommitted transaction rolls it back.

use tracing::{debug, warn};

use crate::error::{ModelError, ModelResult};
use crate::session::Session;

/// Transaction scope guard
pub struct Transaction {
    session: Session,
    nested: bool,
    active: bool,
}

impl Transaction {
    /// Open a transaction scope on the session
    pub fn begin(session: &Session) -> ModelResult<Transaction> {
        let nested = session.begin_scope()?;
        if nested {
            debug!("Joining open transaction");
        }
        Ok(Transaction {
            session: session.clone(),
            nested,
            active: true,
        })
    }

    /// Commit the transaction
    pub fn commit(mut self) -> ModelResult<()> {
        if !self.active {
            return Err(ModelError::Transaction("Transaction has already been consumed".to_string()));
        }
        self.active = false;
        self.session.end_scope(true)
    }

    /// Rollback the transaction
    pub fn rollback(mut self) -> ModelResult<()> {
        if !self.active {
            return Err(ModelError::Transaction("Transaction has already been consumed".to_string()));
        }
        self.active = false;
        self.session.end_scope(false)
    }

    /// Check if the transaction is still active (not committed or rolled back)
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Whether this scope joined an enclosing transaction
    pub fn is_nested(&self) -> bool {
        self.nested
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.active {
            warn!("Transaction dropped without commit or rollback, rolling back");
            self.active = false;
            if let Err(err) = self.session.end_scope(false) {
                warn!("Rollback on drop failed: {}", err);
            }
        }
    }
}

/// Run `f` inside a transaction: commit on `Ok`, roll back on `Err`
pub fn with_transaction<F, R>(session: &Session, f: F) -> ModelResult<R>
where
    F: FnOnce() -> ModelResult<R>,
{
    let tx = Transaction::begin(session)?;

    match f() {
        Ok(result) => {
            tx.commit()?;
            Ok(result)
        }
        Err(err) => {
            warn!("Transaction failed, rolling back: {}", err);
            if let Err(rollback_err) = tx.rollback() {
                warn!("Rollback failed: {}", rollback_err);
            }
            Err(err)
        }
    }
}
