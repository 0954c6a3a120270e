//! Store combinator that keeps a secondary copy of the record.

// self
use crate::{
	_prelude::*,
	auth::TokenState,
	store::{StoreFuture, TokenStore},
};

/// Writes to a primary store first and best-effort to a mirror.
///
/// Typical pairing: a [`FileStore`](crate::store::FileStore) as primary and an
/// [`EnvFileStore`](crate::store::EnvFileStore) as mirror so scripts reading the dotenv file keep
/// working. Loads prefer the primary and fall back to the mirror when the primary is empty.
/// Mirror failures never fail a save; the primary is the source of truth.
#[derive(Clone)]
pub struct MirroredStore {
	primary: Arc<dyn TokenStore>,
	mirror: Arc<dyn TokenStore>,
}
impl MirroredStore {
	/// Pairs a primary store with a mirror.
	pub fn new(primary: Arc<dyn TokenStore>, mirror: Arc<dyn TokenStore>) -> Self {
		Self { primary, mirror }
	}
}
impl Debug for MirroredStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("MirroredStore(..)")
	}
}
impl TokenStore for MirroredStore {
	fn load(&self) -> StoreFuture<'_, Option<TokenState>> {
		Box::pin(async move {
			match self.primary.load().await? {
				Some(state) => Ok(Some(state)),
				None => self.mirror.load().await,
			}
		})
	}

	fn save(&self, state: TokenState) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			self.primary.save(state.clone()).await?;

			if let Err(e) = self.mirror.save(state).await {
				#[cfg(feature = "tracing")]
				tracing::warn!(error = %e, "Failed to update the mirrored token store.");
				#[cfg(not(feature = "tracing"))]
				let _ = e;
			}

			Ok(())
		})
	}
}
