use mongodb::{Client, ClientSession};

use crate::error::Result;

/// A single all-or-nothing group of writes, backed by a MongoDB transaction.
///
/// The transaction only takes effect through [`UnitOfWork::commit`]. If the
/// unit of work is dropped without committing, for example because a step
/// returned early with `?` or the request future was cancelled, the driver
/// aborts the transaction when the session is dropped.
pub struct UnitOfWork {
    session: ClientSession,
}

impl UnitOfWork {
    /// Start a new session and open a transaction on it.
    pub async fn begin(client: &Client) -> Result<Self> {
        let mut session = client.start_session(None).await?;
        session.start_transaction(None).await?;
        Ok(Self { session })
    }

    /// The session every operation in this unit of work must run under.
    pub fn session(&mut self) -> &mut ClientSession {
        &mut self.session
    }

    /// Commit every write made so far.
    pub async fn commit(mut self) -> Result<()> {
        self.session.commit_transaction().await?;
        Ok(())
    }

    /// Explicitly discard every write made so far.
    pub async fn rollback(mut self) -> Result<()> {
        self.session.abort_transaction().await?;
        Ok(())
    }
}
