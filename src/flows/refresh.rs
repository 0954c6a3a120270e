//! Token lifecycle: cache checks, single-flight refresh, and the sticky failed state.
//!
//! [`TokenManager::ensure_access_token`] returns the cached access token while it stays outside
//! the refresh margin. Inside the margin it refreshes under the manager lock, persists the new
//! pair, and hands the result to every caller that queued behind it. A platform rejection, or a
//! transport failure that outlives the retry bound, moves the manager to a failed state that
//! answers every later call without touching the network until the operator reseeds.

mod metrics;

pub use metrics::RefreshMetrics;

// self
use crate::{
	_prelude::*,
	auth::{TokenSecret, TokenState},
	error::TokenError,
	flows::{Grant, TokenManager, TokenPhase, TokenSnapshot},
	http::{PlatformHttpClient, TransportErrorMapper},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

impl<C, M> TokenManager<C, M>
where
	C: ?Sized + PlatformHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Returns an access token valid beyond the refresh margin, refreshing when needed.
	///
	/// At most one refresh runs at a time; callers arriving mid-refresh wait and reuse its result.
	pub async fn ensure_access_token(&self) -> Result<TokenSecret> {
		const KIND: FlowKind = FlowKind::EnsureToken;

		let span = FlowSpan::new(KIND, "ensure_access_token");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let mut phase = self.phase.lock().await;

				self.ensure_locked(&mut phase, false).await.map(|state| state.access_token)
			})
			.await;

		obs::record_flow_result(KIND, &result);

		result
	}

	/// Refreshes immediately, regardless of the remaining lifetime.
	pub async fn force_refresh(&self) -> Result<TokenState> {
		let mut phase = self.phase.lock().await;

		self.ensure_locked(&mut phase, true).await
	}

	/// Reports the current state without loading or refreshing anything.
	pub async fn state_snapshot(&self) -> TokenSnapshot {
		let phase = self.phase.lock().await;
		let now = OffsetDateTime::now_utc();

		match &*phase {
			TokenPhase::Uninitialized => TokenSnapshot::Uninitialized,
			TokenPhase::Active(state) if state.needs_refresh_at(now, self.refresh_margin) =>
				TokenSnapshot::NeedsRefresh { expires_at: state.expires_at },
			TokenPhase::Active(state) => TokenSnapshot::Valid { expires_at: state.expires_at },
			TokenPhase::Empty => TokenSnapshot::Unseeded,
			TokenPhase::Failed { reason, .. } => TokenSnapshot::Failed { reason: reason.clone() },
		}
	}

	/// Persists operator-provided tokens and leaves any failed state.
	pub async fn reseed(&self, state: TokenState) -> Result<()> {
		let mut phase = self.phase.lock().await;

		self.store.save(state.clone()).await?;
		obs::record_token_transition(phase.label(), "valid", "reseeded");

		*phase = TokenPhase::Active(state);

		Ok(())
	}

	/// Forgets the in-memory state so the next call reloads the store.
	///
	/// Use after tokens were replaced out of band (e.g., another process ran the exchange).
	pub async fn reset(&self) {
		let mut phase = self.phase.lock().await;

		obs::record_token_transition(phase.label(), "uninitialized", "reset");

		*phase = TokenPhase::Uninitialized;
	}

	async fn ensure_locked(&self, phase: &mut TokenPhase, force: bool) -> Result<TokenState> {
		if matches!(phase, TokenPhase::Uninitialized) {
			self.initialize(phase).await?;
		}

		let now = OffsetDateTime::now_utc();

		match &*phase {
			TokenPhase::Failed { reason, kind } =>
				Err(TokenError::ReauthorizationRequired { reason: reason.clone(), kind: *kind }
					.into()),
			TokenPhase::Active(state) if !force && !state.needs_refresh_at(now, self.refresh_margin) =>
				Ok(state.clone()),
			TokenPhase::Active(state) => {
				let refresh_token =
					state.usable_refresh_token().cloned().ok_or(TokenError::MissingRefreshToken)?;

				self.refresh_locked(phase, refresh_token).await
			},
			TokenPhase::Empty | TokenPhase::Uninitialized =>
				Err(TokenError::MissingRefreshToken.into()),
		}
	}

	async fn initialize(&self, phase: &mut TokenPhase) -> Result<()> {
		let (next, source) = match self.store.load().await? {
			Some(state) => (TokenPhase::Active(state), "store"),
			None => match &self.seed {
				Some(seed) => (TokenPhase::Active(seed.clone()), "seed"),
				None => (TokenPhase::Empty, "none"),
			},
		};

		obs::record_token_transition(phase.label(), next.label(), source);

		*phase = next;

		Ok(())
	}

	async fn refresh_locked(
		&self,
		phase: &mut TokenPhase,
		refresh_token: TokenSecret,
	) -> Result<TokenState> {
		const KIND: FlowKind = FlowKind::Refresh;

		let span = FlowSpan::new(KIND, "refresh_locked");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);
		self.refresh_metrics.record_attempt();

		let result = span
			.instrument(async {
				let refreshed = self
					.exchange_token(
						Grant::RefreshToken,
						refresh_token.expose(),
						Some(&refresh_token),
						self.retry_policy.max_retries,
					)
					.await;

				match refreshed {
					Ok(state) => {
						obs::record_token_transition(phase.label(), "valid", "refreshed");

						*phase = TokenPhase::Active(state.clone());

						self.store.save(state.clone()).await?;

						Ok(state)
					},
					Err(e @ (Error::Token(_) | Error::Transport(_))) => {
						let kind = match &e {
							Error::Token(TokenError::Rejected { kind, .. }) => Some(*kind),
							_ => None,
						};
						let reason = e.to_string();

						obs::record_token_transition(phase.label(), "failed", &reason);

						*phase = TokenPhase::Failed { reason: reason.clone(), kind };

						// Transport retries are exhausted here.
						match e {
							Error::Transport(_) =>
								Err(TokenError::ReauthorizationRequired { reason, kind }.into()),
							e => Err(e),
						}
					},
					Err(e) => Err(e),
				}
			})
			.await;

		match &result {
			Ok(_) => self.refresh_metrics.record_success(),
			Err(_) => self.refresh_metrics.record_failure(),
		}

		obs::record_flow_result(KIND, &result);

		result
	}
}
