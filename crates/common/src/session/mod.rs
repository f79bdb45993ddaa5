//! Per-application session bootstrap
//!
//! A [`Session`] owns the resident master key and turns a request from an
//! application origin into a stored, sealed credential:
//!
//! 1. `dApp id = SHA-256(origin)`, child index = `HARDENED_BIT | first four bytes`
//! 2. derive the child key
//! 3. seal a fresh session key to the master public key
//! 4. seal the child credential under the session key
//! 5. append both to the identity's chain and move the ledger head

mod bootstrap;
mod state;

pub use bootstrap::{
    random_placeholder_url, DappIdentifierMode, OpenedCredential, Session, SessionBuilder,
    SessionConfig, SessionError, SessionIdentity,
};
pub use state::{SessionPhase, SessionState};
