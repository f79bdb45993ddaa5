use clap::{Args, Subcommand};

pub mod head;
pub mod retry;

use crate::cli::op::Op;

crate::command_enum! {
    (Head, head::Head),
    (Retry, retry::Retry),
}

pub type ChainCommand = Command;

#[derive(Args, Debug, Clone)]
pub struct Chain {
    #[command(subcommand)]
    pub command: ChainCommand,
}

#[async_trait::async_trait]
impl Op for Chain {
    type Error = OpError;
    type Output = OpOutput;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        self.command.execute(ctx).await
    }
}
