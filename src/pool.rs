//! Reusable hash states.

use parking_lot::Mutex;

use crate::accumulator::Accumulator;
use crate::error::HashResult;
use crate::state::HashState;

/// Idle states kept around after use.
const MAX_IDLE: usize = 32;

/// Boxed accumulator constructor.
pub(crate) type Factory<A> = Box<dyn Fn() -> A + Send + Sync>;

/// Pool of [`HashState`]s sharing one accumulator factory.
pub(crate) struct StatePool<A> {
    factory: Factory<A>,
    idle: Mutex<Vec<HashState<A>>>,
}

impl<A: Accumulator> StatePool<A> {
    pub fn new(factory: Factory<A>) -> Self {
        Self {
            factory,
            idle: Mutex::new(Vec::new()),
        }
    }

    /// Run `f` with a freshly reset state.
    ///
    /// The state goes back to the pool on every exit path, errors included.
    pub fn with_state<R>(&self, f: impl FnOnce(&mut HashState<A>) -> HashResult<R>) -> HashResult<R> {
        let mut state = self.acquire();
        let result = f(&mut state);
        self.release(state);
        result
    }

    /// Digest of a freshly constructed accumulator.
    pub fn empty_digest(&self) -> u64 {
        (self.factory)().sum64()
    }

    fn acquire(&self) -> HashState<A> {
        let reused = self.idle.lock().pop();
        match reused {
            Some(mut state) => {
                state.reset();
                state
            }
            None => HashState::new((self.factory)()),
        }
    }

    fn release(&self, state: HashState<A>) {
        let mut idle = self.idle.lock();
        if idle.len() < MAX_IDLE {
            idle.push(state);
        }
    }

    #[cfg(test)]
    pub fn idle_len(&self) -> usize {
        self.idle.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accumulator::Fnv64a;
    use crate::error::HashError;

    fn pool() -> StatePool<Fnv64a> {
        StatePool::new(Box::new(Fnv64a::new))
    }

    #[test]
    fn test_state_is_returned() {
        let pool = pool();
        let digest = pool
            .with_state(|state| {
                state.write(b"hello")?;
                Ok(state.sum64())
            })
            .unwrap();
        assert_eq!(digest, 0xa430d84680aabd0b);
        assert_eq!(pool.idle_len(), 1);
    }

    #[test]
    fn test_state_is_returned_on_error() {
        let pool = pool();
        let result: HashResult<()> =
            pool.with_state(|_| Err(HashError::UnsupportedType { type_name: "X" }));
        assert!(result.is_err());
        assert_eq!(pool.idle_len(), 1);
    }

    #[test]
    fn test_reused_state_is_reset() {
        let pool = pool();
        pool.with_state(|state| {
            state.write(b"dirty")?;
            state.enter(9);
            Ok(())
        })
        .unwrap();

        pool.with_state(|state| {
            assert_eq!(state.sum64(), Fnv64a::new().sum64());
            assert!(state.enter(9));
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_nested_checkout() {
        let pool = pool();
        pool.with_state(|outer| {
            outer.write(b"outer")?;
            pool.with_state(|inner| {
                assert_eq!(inner.sum64(), Fnv64a::new().sum64());
                Ok(())
            })
        })
        .unwrap();
        assert_eq!(pool.idle_len(), 2);
    }

    #[test]
    fn test_idle_is_bounded() {
        let pool = pool();
        let states: Vec<_> = (0..MAX_IDLE + 8).map(|_| pool.acquire()).collect();
        for state in states {
            pool.release(state);
        }
        assert_eq!(pool.idle_len(), MAX_IDLE);
    }

    #[test]
    fn test_empty_digest() {
        assert_eq!(pool().empty_digest(), 0xcbf29ce484222325);
    }
}
