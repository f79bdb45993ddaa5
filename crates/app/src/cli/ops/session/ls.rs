use clap::Args;

use common::session::SessionError;
use sealchain::StateError;

#[derive(Args, Debug, Clone)]
pub struct Ls {
    /// Also print each session's private key
    #[arg(long)]
    pub reveal: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionLsError {
    #[error("state error: {0}")]
    State(#[from] StateError),
    #[error("failed to read sessions: {0}")]
    Session(#[from] SessionError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Ls {
    type Error = SessionLsError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let (_state, session) = ctx.open_session().await?;
        let opened = session.read_credentials().await?;

        if opened.is_empty() {
            return Ok("No sessions found".to_string());
        }

        let output = opened
            .iter()
            .map(|entry| {
                let credential = &entry.credential;
                let mut line = format!(
                    "#{} dapp {} key {}",
                    entry.position,
                    hex::encode(&credential.dapp_identifier),
                    hex::encode(&credential.session_public_key),
                );
                if self.reveal {
                    line.push_str(&format!(
                        " private {}",
                        hex::encode(&credential.session_private_key)
                    ));
                }
                line
            })
            .collect::<Vec<_>>()
            .join("\n");
        Ok(output)
    }
}
