//! Adapters for values that encode themselves.

use crate::accumulator::Accumulator;
use crate::error::{DelegateKind, HashError, HashResult};
use crate::reflect::Reflect;
use crate::state::HashState;

/// Hands the value to one of its declared capabilities.
pub(crate) struct Delegate {
    kind: DelegateKind,
    type_name: &'static str,
}

impl Delegate {
    pub fn new(kind: DelegateKind, type_name: &'static str) -> Self {
        Self { kind, type_name }
    }

    pub fn encode<A: Accumulator>(&self, value: &dyn Reflect, state: &mut HashState<A>) -> HashResult<()> {
        let produced = match self.kind {
            DelegateKind::HashWriter => {
                let writer = value.hash_writer().ok_or_else(|| self.missing())?;
                return writer
                    .write_hash(state.accumulator_mut())
                    .map_err(|err| HashError::delegate(self.type_name, self.kind, err));
            }
            DelegateKind::Binary => value.binary_delegate(),
            DelegateKind::Text => value.text_delegate(),
            DelegateKind::Json => value.json_delegate(),
            DelegateKind::Display => value.display_delegate().map(|s| Ok(s.into_bytes())),
        };

        let bytes = produced
            .ok_or_else(|| self.missing())?
            .map_err(|err| HashError::delegate(self.type_name, self.kind, err))?;
        state.write(&bytes)
    }

    fn missing(&self) -> HashError {
        HashError::mismatch(self.type_name, self.kind.as_str())
    }
}
