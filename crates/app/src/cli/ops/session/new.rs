use clap::Args;

use common::session::SessionError;
use sealchain::StateError;

#[derive(Args, Debug, Clone)]
pub struct New {
    /// Origin of the application requesting a session, e.g. https://app.example
    pub origin: String,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionNewError {
    #[error("state error: {0}")]
    State(#[from] StateError),
    #[error("a head update is pending, run 'sealchain chain retry' first")]
    Pending,
    #[error("{0}\nthe record was stored; run 'sealchain chain retry' to commit it")]
    Orphaned(SessionError),
    #[error("session request failed: {0}")]
    Session(#[from] SessionError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for New {
    type Error = SessionNewError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let (state, mut session) = ctx.open_session().await?;
        // appending on top of a pending update would fork the chain
        if state.load_pending()?.is_some() {
            return Err(SessionNewError::Pending);
        }

        let identity = match session.request_new_session(&self.origin).await {
            Ok(identity) => identity,
            Err(SessionError::Chain(chain)) => {
                // an orphan the ledger rejected outright can never be committed
                let err = match chain.orphan() {
                    Some(orphan) if chain.is_retryable() => {
                        state.save_pending(orphan)?;
                        tracing::warn!(list = %orphan.list_id, "saved pending head update");
                        SessionNewError::Orphaned(SessionError::Chain(chain))
                    }
                    _ => SessionNewError::Session(SessionError::Chain(chain)),
                };
                return Err(err);
            }
            Err(e) => return Err(e.into()),
        };

        let mut lines = vec![
            format!("origin:       {}", identity.dapp_origin),
            format!("dapp id:      {}", hex::encode(identity.dapp_identifier)),
            format!("child index:  {:#010x}", identity.child_index),
            format!("public key:   {}", hex::encode(identity.public_key)),
            format!("head:         {}", identity.head),
        ];
        if let Some(receipt) = &identity.receipt {
            lines.push(format!("nonce:        {}", receipt.nonce));
            lines.push(format!("fee:          {}", receipt.fee));
        }
        Ok(lines.join("\n"))
    }
}
