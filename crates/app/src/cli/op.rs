use std::error::Error;
use std::path::PathBuf;

use tokio::sync::watch;

use sealchain::state::{AppSession, AppState, StateError};

#[derive(Clone)]
pub struct OpContext {
    /// Optional custom state path (defaults to ~/.sealchain)
    pub config_path: Option<PathBuf>,
    /// Fires once on ctrl-c
    pub shutdown: watch::Receiver<()>,
}

impl OpContext {
    pub fn new(config_path: Option<PathBuf>, shutdown: watch::Receiver<()>) -> Self {
        Self {
            config_path,
            shutdown,
        }
    }

    pub fn load_state(&self) -> Result<AppState, StateError> {
        AppState::load(self.config_path.clone())
    }

    /// Load state and open a session over it, cancelled on ctrl-c
    pub async fn open_session(&self) -> Result<(AppState, AppSession), StateError> {
        let state = self.load_state()?;
        let session = state.session(Some(self.shutdown.clone())).await?;
        Ok((state, session))
    }
}

#[async_trait::async_trait]
pub trait Op: Send + Sync {
    type Error: Error + Send + Sync + 'static;
    type Output;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error>;
}

#[macro_export]
macro_rules! command_enum {
    ($(($variant:ident, $type:ty)),* $(,)?) => {
        #[derive(Subcommand, Debug, Clone)]
        pub enum Command {
            $($variant($type),)*
        }

        #[derive(Debug)]
        pub enum OpOutput {
            $($variant(<$type as $crate::cli::op::Op>::Output),)*
        }

        #[derive(Debug, thiserror::Error)]
        pub enum OpError {
            $(
                #[error(transparent)]
                $variant(<$type as $crate::cli::op::Op>::Error),
            )*
        }

        #[async_trait::async_trait]
        impl $crate::cli::op::Op for Command {
            type Output = OpOutput;
            type Error = OpError;

            async fn execute(&self, ctx: &$crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
                match self {
                    $(
                        Command::$variant(op) => {
                            op.execute(ctx).await
                                .map(OpOutput::$variant)
                                .map_err(OpError::$variant)
                        },
                    )*
                }
            }
        }

        impl std::fmt::Display for OpOutput {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(
                        OpOutput::$variant(output) => write!(f, "{}", output),
                    )*
                }
            }
        }
    };
}
