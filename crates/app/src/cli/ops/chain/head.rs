use clap::Args;

use common::chain::{BlobStore, BlobStoreError, ChainError, ListBlob};
use common::ledger::LedgerError;
use sealchain::StateError;

#[derive(Args, Debug, Clone)]
pub struct Head;

#[derive(Debug, thiserror::Error)]
pub enum ChainHeadError {
    #[error("state error: {0}")]
    State(#[from] StateError),
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
    #[error("blob store error: {0}")]
    Blob(#[from] BlobStoreError),
    #[error("chain error: {0}")]
    Chain(#[from] ChainError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Head {
    type Error = ChainHeadError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let (state, session) = ctx.open_session().await?;
        let address = state.owner_address()?;
        let chain = session.chain();

        let head = chain.head(&address).await?;
        let mut lines = vec![format!("address: {}", address)];
        if head.is_empty() {
            lines.push("head:    (empty)".to_string());
        } else {
            let list = ListBlob::decode(&chain.blobs().get(&head).await?)?;
            lines.push(format!("head:    {}", head));
            lines.push(format!("records: {}", list.len()));
        }
        if let Some(orphan) = state.load_pending()? {
            lines.push(format!("pending: {}", orphan.list_id));
        }
        Ok(lines.join("\n"))
    }
}
