//! Thread-safe in-memory [`TokenStore`] implementation for local development and tests.

// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::{
	_prelude::*,
	auth::TokenState,
	store::{StoreFuture, TokenStore},
};

/// Keeps the record in-process and counts writes so tests can assert persistence.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
	slot: Arc<RwLock<Option<TokenState>>>,
	saves: Arc<AtomicU64>,
}
impl MemoryStore {
	/// Creates a store pre-populated with `state`.
	pub fn seeded(state: TokenState) -> Self {
		Self { slot: Arc::new(RwLock::new(Some(state))), saves: Default::default() }
	}

	/// Returns the current record without going through the async contract.
	pub fn snapshot(&self) -> Option<TokenState> {
		self.slot.read().clone()
	}

	/// Number of completed saves.
	pub fn save_count(&self) -> u64 {
		self.saves.load(Ordering::Relaxed)
	}
}
impl TokenStore for MemoryStore {
	fn load(&self) -> StoreFuture<'_, Option<TokenState>> {
		let slot = self.slot.clone();

		Box::pin(async move { Ok(slot.read().clone()) })
	}

	fn save(&self, state: TokenState) -> StoreFuture<'_, ()> {
		let slot = self.slot.clone();
		let saves = self.saves.clone();

		Box::pin(async move {
			*slot.write() = Some(state);
			saves.fetch_add(1, Ordering::Relaxed);

			Ok(())
		})
	}
}
