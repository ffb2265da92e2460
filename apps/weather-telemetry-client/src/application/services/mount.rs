//! Widget Mount Lifecycle
//!
//! Resolves the session inputs, then owns one telemetry socket for as long as
//! the returned [`WidgetMount`] lives.
//!
//! ```text
//! credential ──► targets ──► first target ──► SocketClient task
//!                   │
//!                   └── empty ──► ConfigMissing (no socket)
//! ```
//!
//! Teardown runs on every exit path: [`WidgetMount::unmount`], the shutdown
//! token, or dropping the handle.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};

use super::health::ConnectionHealth;
use crate::application::ports::{SessionError, SessionProvider};
use crate::domain::connection::StreamEvent;
use crate::domain::session::{Credential, SubscriptionTarget};
use crate::domain::telemetry::SharedTelemetryStore;
use crate::infrastructure::config::ClientConfig;
use crate::infrastructure::thingsboard::{
    ClientError, SessionReport, SocketClient, SocketClientConfig, TelemetryCodec,
};

/// Errors from mounting or running a widget.
#[derive(Debug, thiserror::Error)]
pub enum MountError {
    /// Session inputs could not be resolved.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The socket session failed.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// The session task panicked or was aborted.
    #[error("session task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Shared collaborators handed to a mount.
#[derive(Debug, Clone, Default)]
pub struct MountContext {
    /// Store the session writes into.
    pub store: SharedTelemetryStore,
    /// Health tracker fed with every status event.
    pub health: Arc<ConnectionHealth>,
    /// Optional status event subscriber.
    pub events: Option<mpsc::Sender<StreamEvent>>,
    /// Parent shutdown token; cancelling it unmounts.
    pub shutdown: CancellationToken,
}

/// A mounted widget owning one socket session.
#[derive(Debug)]
pub struct WidgetMount {
    task: JoinHandle<Result<SessionReport, ClientError>>,
    guard: DropGuard,
    health: Arc<ConnectionHealth>,
}

impl WidgetMount {
    /// Resolve the session and start the socket session.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::ConfigMissing`] when no subscription target is
    /// configured, or any provider error. No socket is created in either case.
    pub async fn mount<P>(
        config: &ClientConfig,
        provider: &P,
        ctx: MountContext,
    ) -> Result<Self, MountError>
    where
        P: SessionProvider + ?Sized,
    {
        let (credential, target) = resolve_session(provider).await?;

        let cancel = ctx.shutdown.child_token();
        let mut client = SocketClient::new(
            SocketClientConfig::from(config),
            TelemetryCodec::new(config.display.formatter()),
            credential,
            target,
            ctx.store,
            Arc::clone(&ctx.health),
            cancel.clone(),
        );
        if let Some(tx) = ctx.events {
            client = client.with_events(tx);
        }

        let task = tokio::spawn(client.run());

        Ok(Self {
            task,
            guard: cancel.drop_guard(),
            health: ctx.health,
        })
    }

    /// Mount, then wait until the session ends on its own or via the shutdown
    /// token.
    ///
    /// # Errors
    ///
    /// Same as [`WidgetMount::mount`] and [`WidgetMount::join`].
    pub async fn run_until_closed<P>(
        config: &ClientConfig,
        provider: &P,
        ctx: MountContext,
    ) -> Result<SessionReport, MountError>
    where
        P: SessionProvider + ?Sized,
    {
        Self::mount(config, provider, ctx).await?.join().await
    }

    /// Health tracker for this session.
    #[must_use]
    pub const fn health(&self) -> &Arc<ConnectionHealth> {
        &self.health
    }

    /// Whether the session task has ended.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Close the socket (if open) and wait for the session to end.
    ///
    /// # Errors
    ///
    /// Returns the session error if it had already failed.
    pub async fn unmount(self) -> Result<SessionReport, MountError> {
        let Self { task, guard, .. } = self;
        guard.disarm().cancel();
        tracing::info!("Widget unmounted");
        Ok(task.await??)
    }

    /// Wait for the session to end without requesting it.
    ///
    /// # Errors
    ///
    /// Returns the session error, if any.
    pub async fn join(self) -> Result<SessionReport, MountError> {
        let Self { task, guard, .. } = self;
        let result = task.await;
        drop(guard);
        Ok(result??)
    }
}

/// Resolve the credential, then the first subscription target.
async fn resolve_session<P>(provider: &P) -> Result<(Credential, SubscriptionTarget), SessionError>
where
    P: SessionProvider + ?Sized,
{
    let credential = provider.credential().await.map_err(|e| {
        tracing::error!(error = %e, "Failed to obtain auth token");
        e
    })?;

    let targets = provider
        .subscription_targets(&credential)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to look up widget settings");
            e
        })?;

    let candidates = targets.len();
    let Some(target) = targets.into_iter().next() else {
        tracing::error!("No subscription target configured; telemetry stream not opened");
        return Err(SessionError::ConfigMissing);
    };

    if candidates > 1 {
        tracing::debug!(candidates, "Using the first subscription target");
    }

    Ok((credential, target))
}
