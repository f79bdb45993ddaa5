use crate::crypto::{ExtendedKey, OwnerAddress};
use crate::ledger::LedgerSigner;

use super::SessionError;

/// Where a session stands in the bootstrap of a new credential
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// No master key resident
    Uninitialized,
    /// Master key resident, ready to bootstrap
    MasterKeyLoaded,
    /// Child key derived for the requesting application
    ChildDerived,
    /// Child key material sealed, not yet stored
    PayloadSealed,
    /// Sealed credential stored and anchored
    Stored,
}

/// The resident master key of one identity
///
/// Exactly one value owns the master key. It is wiped when the state is
/// cleared or dropped.
#[derive(Debug)]
pub struct SessionState {
    master: Option<ResidentMaster>,
    phase: SessionPhase,
}

#[derive(Debug)]
struct ResidentMaster {
    key: ExtendedKey,
    signer: LedgerSigner,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            master: None,
            phase: SessionPhase::Uninitialized,
        }
    }

    /// Make `key` the resident master key, replacing any previous one
    pub fn load(&mut self, key: ExtendedKey) {
        let signer = LedgerSigner::from_key(&key);
        self.master = Some(ResidentMaster { key, signer });
        self.phase = SessionPhase::MasterKeyLoaded;
    }

    /// Drop the resident master key
    pub fn clear(&mut self) {
        // key material zeroizes itself on drop
        self.master = None;
        self.phase = SessionPhase::Uninitialized;
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_loaded(&self) -> bool {
        self.master.is_some()
    }

    pub fn master(&self) -> Result<&ExtendedKey, SessionError> {
        self.master
            .as_ref()
            .map(|master| &master.key)
            .ok_or(SessionError::NotInitialized)
    }

    pub fn signer(&self) -> Result<&LedgerSigner, SessionError> {
        self.master
            .as_ref()
            .map(|master| &master.signer)
            .ok_or(SessionError::NotInitialized)
    }

    pub fn owner_address(&self) -> Result<OwnerAddress, SessionError> {
        Ok(*self.signer()?.address())
    }

    pub(crate) fn advance(&mut self, phase: SessionPhase) {
        if self.master.is_some() {
            self.phase = phase;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_lifecycle() {
        let mut state = SessionState::new();
        assert_eq!(state.phase(), SessionPhase::Uninitialized);
        assert!(matches!(state.master(), Err(SessionError::NotInitialized)));

        let key = ExtendedKey::from_seed(b"state").unwrap();
        let address = key.owner_address();
        state.load(key);
        assert_eq!(state.phase(), SessionPhase::MasterKeyLoaded);
        assert_eq!(state.owner_address().unwrap(), address);

        state.advance(SessionPhase::ChildDerived);
        assert_eq!(state.phase(), SessionPhase::ChildDerived);

        state.clear();
        assert_eq!(state.phase(), SessionPhase::Uninitialized);
        assert!(!state.is_loaded());
        assert!(matches!(state.signer(), Err(SessionError::NotInitialized)));

        // nothing to advance without a master key
        state.advance(SessionPhase::Stored);
        assert_eq!(state.phase(), SessionPhase::Uninitialized);
    }
}
