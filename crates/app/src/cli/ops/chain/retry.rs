use clap::Args;

use common::session::SessionError;
use sealchain::StateError;

#[derive(Args, Debug, Clone)]
pub struct Retry;

#[derive(Debug, thiserror::Error)]
pub enum ChainRetryError {
    #[error("state error: {0}")]
    State(#[from] StateError),
    #[error("head update failed again: {0}")]
    Session(#[from] SessionError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Retry {
    type Error = ChainRetryError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let (state, mut session) = ctx.open_session().await?;
        let Some(orphan) = state.load_pending()? else {
            return Ok("Nothing to retry".to_string());
        };

        let appended = match session.retry_head_update(&orphan).await {
            Ok(appended) => appended,
            Err(SessionError::Chain(chain)) => {
                match chain.orphan() {
                    // a rebased retry leaves a newer orphan behind
                    Some(newer) if chain.is_retryable() => state.save_pending(newer)?,
                    Some(_) => {
                        tracing::warn!(list = %orphan.list_id, "dropping pending head update the ledger rejected");
                        state.clear_pending()?;
                    }
                    None => {}
                }
                return Err(SessionError::Chain(chain).into());
            }
            Err(e) => return Err(e.into()),
        };
        state.clear_pending()?;

        Ok(match appended.receipt {
            Some(receipt) => format!("head: {} (nonce {})", appended.head, receipt.nonce),
            None => format!("head: {} (already committed)", appended.head),
        })
    }
}
