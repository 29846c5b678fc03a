//! Per-session admin status: the live [`RoleState`] for whoever is signed in.
//!
//! An [`AdminStatusTracker`] follows a session channel and re-resolves on
//! every change. A resolution that is overtaken by a newer identity is
//! dropped and restarted; once the tracker is dropped nothing is published
//! again. Both rules hang off a [`Generation`] counter.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use booksmartly_core::UserId;

use crate::{AccessControlResolver, ApprovalLookup, Identity, RoleLookup, RoleState, SessionState};

/// Snapshot published by the tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminStatus {
    #[serde(flatten)]
    pub role_state: RoleState,
    pub is_loading: bool,
    /// User the snapshot belongs to (`None` when signed out or pending).
    #[serde(skip)]
    pub subject: Option<UserId>,
    #[serde(skip)]
    pub generation: u64,
}

impl AdminStatus {
    fn loading(subject: Option<UserId>, generation: u64) -> Self {
        Self {
            role_state: RoleState::restricted(),
            is_loading: true,
            subject,
            generation,
        }
    }

    /// Whether this snapshot was resolved for `identity`.
    pub fn is_for(&self, identity: Option<&Identity>) -> bool {
        self.subject.as_ref() == identity.map(|i| &i.user_id)
    }
}

/// Monotonic counter; bumping it invalidates every outstanding ticket.
#[derive(Debug, Clone, Default)]
pub struct Generation(Arc<AtomicU64>);

impl Generation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }

    /// Start a new resolution cycle.
    pub fn advance(&self) -> ResolutionTicket {
        let value = self.0.fetch_add(1, Ordering::SeqCst) + 1;
        ResolutionTicket {
            generation: self.clone(),
            value,
        }
    }

    /// Invalidate all tickets without starting a new cycle (teardown).
    pub fn invalidate(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Proof that a resolution was started at a given generation.
#[derive(Debug, Clone)]
pub struct ResolutionTicket {
    generation: Generation,
    value: u64,
}

impl ResolutionTicket {
    pub fn value(&self) -> u64 {
        self.value
    }

    pub fn is_current(&self) -> bool {
        self.generation.current() == self.value
    }
}

/// Owns the background resolution task for one session.
pub struct AdminStatusTracker {
    status: watch::Receiver<AdminStatus>,
    generation: Generation,
    task: JoinHandle<()>,
}

impl AdminStatusTracker {
    /// Start tracking `session`. Must be called inside a tokio runtime.
    pub fn spawn<R, A>(
        resolver: Arc<AccessControlResolver<R, A>>,
        session: watch::Receiver<SessionState>,
    ) -> Self
    where
        R: RoleLookup + 'static,
        A: ApprovalLookup + 'static,
    {
        let generation = Generation::new();
        let (tx, status) = watch::channel(AdminStatus::loading(None, 0));
        let task = tokio::spawn(run(resolver, session, tx, generation.clone()));

        Self {
            status,
            generation,
            task,
        }
    }

    pub fn current(&self) -> AdminStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AdminStatus> {
        self.status.clone()
    }

    /// Wait for the current cycle to finish loading.
    ///
    /// Returns the last published snapshot if the tracker task has stopped.
    pub async fn settled(&self) -> AdminStatus {
        let mut rx = self.status.clone();
        let settled = rx.wait_for(|s| !s.is_loading).await.map(|s| s.clone());
        match settled {
            Ok(status) => status,
            Err(_) => rx.borrow().clone(),
        }
    }
}

impl Drop for AdminStatusTracker {
    fn drop(&mut self) {
        self.generation.invalidate();
        self.task.abort();
    }
}

async fn run<R, A>(
    resolver: Arc<AccessControlResolver<R, A>>,
    mut session: watch::Receiver<SessionState>,
    tx: watch::Sender<AdminStatus>,
    generation: Generation,
) where
    R: RoleLookup,
    A: ApprovalLookup,
{
    loop {
        let current = session.borrow_and_update().clone();
        let ticket = generation.advance();
        // Once the session source is gone the current identity is final.
        let mut source_open = true;

        match current {
            SessionState::Pending => {
                publish(&tx, &ticket, AdminStatus::loading(None, ticket.value()));
            }
            SessionState::Resolved(identity) => {
                let subject = identity.as_ref().map(|i| i.user_id.clone());
                publish(&tx, &ticket, AdminStatus::loading(subject.clone(), ticket.value()));

                let resolution = resolver.resolve(identity.as_ref());
                tokio::pin!(resolution);

                let resolved = loop {
                    tokio::select! {
                        biased;

                        changed = session.changed(), if source_open => {
                            if changed.is_ok() {
                                break None;
                            }
                            source_open = false;
                        }
                        role_state = &mut resolution => break Some(role_state),
                    }
                };

                match resolved {
                    Some(role_state) => publish(&tx, &ticket, AdminStatus {
                        role_state,
                        is_loading: false,
                        subject,
                        generation: ticket.value(),
                    }),
                    None => {
                        debug!(generation = ticket.value(), "session changed mid-resolution, restarting");
                        continue;
                    }
                }
            }
        }

        if !source_open || session.changed().await.is_err() {
            return;
        }
    }
}

fn publish(tx: &watch::Sender<AdminStatus>, ticket: &ResolutionTicket, status: AdminStatus) {
    if !ticket.is_current() {
        debug!(generation = ticket.value(), "discarding stale admin status");
        return;
    }
    tx.send_replace(status);
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::Semaphore;

    use booksmartly_core::OrganizationId;

    use super::*;
    use crate::{Approval, LookupError, PRIVILEGED_EMAIL, PrivilegePolicy, RoleLookupResult};

    /// Role lookup whose answers are released by a semaphore.
    struct GatedRoles {
        permits: Arc<Semaphore>,
        results: HashMap<UserId, RoleLookupResult>,
    }

    #[async_trait]
    impl RoleLookup for GatedRoles {
        async fn check_admin_status(&self, user_id: &UserId) -> Result<RoleLookupResult, LookupError> {
            let _permit = self
                .permits
                .acquire()
                .await
                .map_err(|e| LookupError::Unavailable(e.to_string()))?;
            Ok(self.results.get(user_id).copied().unwrap_or_default())
        }
    }

    struct NoApprovals;

    #[async_trait]
    impl ApprovalLookup for NoApprovals {
        async fn get_approval(&self, _user_id: &UserId) -> Result<Option<Approval>, LookupError> {
            Ok(None)
        }
    }

    fn setup(permits: usize) -> (Arc<Semaphore>, Arc<AccessControlResolver<GatedRoles, NoApprovals>>) {
        let permits = Arc::new(Semaphore::new(permits));
        let mut results = HashMap::new();
        results.insert(
            UserId::new("admin"),
            RoleLookupResult {
                is_admin: true,
                is_org_admin: true,
                organization_id: Some(OrganizationId::new(7)),
                ..RoleLookupResult::default()
            },
        );
        let roles = GatedRoles {
            permits: permits.clone(),
            results,
        };
        let resolver = Arc::new(AccessControlResolver::new(roles, NoApprovals, PrivilegePolicy::default()));
        (permits, resolver)
    }

    #[test]
    fn advancing_the_generation_stales_older_tickets() {
        let generation = Generation::new();
        let first = generation.advance();
        assert!(first.is_current());

        let second = generation.advance();
        assert!(!first.is_current());
        assert!(second.is_current());

        generation.invalidate();
        assert!(!second.is_current());
    }

    #[tokio::test]
    async fn pending_session_reports_loading() {
        let (_permits, resolver) = setup(10);
        let (_session_tx, session_rx) = watch::channel(SessionState::Pending);

        let tracker = AdminStatusTracker::spawn(resolver, session_rx);
        tokio::task::yield_now().await;

        let status = tracker.current();
        assert!(status.is_loading);
        assert_eq!(status.role_state, RoleState::restricted());
    }

    #[tokio::test]
    async fn signed_out_session_settles_restricted() {
        let (_permits, resolver) = setup(0);
        let (_session_tx, session_rx) = watch::channel(SessionState::signed_out());

        let tracker = AdminStatusTracker::spawn(resolver, session_rx);
        let status = tracker.settled().await;

        assert!(!status.is_loading);
        assert_eq!(status.role_state, RoleState::restricted());
        assert!(status.is_for(None));
    }

    #[tokio::test]
    async fn closed_session_source_still_resolves() {
        let (_permits, resolver) = setup(10);

        let (session_tx, session_rx) = watch::channel(SessionState::signed_in(Identity::new("1", PRIVILEGED_EMAIL)));
        drop(session_tx);
        let tracker = AdminStatusTracker::spawn(resolver.clone(), session_rx);
        let status = tracker.settled().await;
        assert!(!status.is_loading);
        assert!(status.role_state.is_super_admin);

        let identity = Identity::new("admin", "admin@x.com");
        let (session_tx, session_rx) = watch::channel(SessionState::signed_in(identity.clone()));
        drop(session_tx);
        let tracker = AdminStatusTracker::spawn(resolver, session_rx);
        let status = tracker.settled().await;
        assert!(!status.is_loading);
        assert!(status.is_for(Some(&identity)));
        assert!(status.role_state.is_admin);
    }

    #[tokio::test]
    async fn sign_in_resolves_role_state() {
        let (_permits, resolver) = setup(10);
        let (session_tx, session_rx) = watch::channel(SessionState::Pending);
        let tracker = AdminStatusTracker::spawn(resolver, session_rx);

        let identity = Identity::new("admin", "admin@x.com");
        session_tx.send_replace(SessionState::signed_in(identity.clone()));

        let mut rx = tracker.subscribe();
        let status = rx
            .wait_for(|s| !s.is_loading && s.is_for(Some(&identity)))
            .await
            .unwrap()
            .clone();

        assert!(status.role_state.is_admin);
        assert_eq!(status.role_state.organization_id, Some(OrganizationId::new(7)));
    }

    #[tokio::test]
    async fn identity_change_mid_resolution_restarts() {
        let (permits, resolver) = setup(0);
        let first = Identity::new("admin", "admin@x.com");
        let (session_tx, session_rx) = watch::channel(SessionState::signed_in(first));
        let tracker = AdminStatusTracker::spawn(resolver, session_rx);
        tokio::task::yield_now().await;

        let second = Identity::new("someone", "someone@x.com");
        session_tx.send_replace(SessionState::signed_in(second.clone()));
        permits.add_permits(10);

        let mut rx = tracker.subscribe();
        let status = rx
            .wait_for(|s| !s.is_loading)
            .await
            .unwrap()
            .clone();

        assert!(status.is_for(Some(&second)));
        assert_eq!(status.role_state, RoleState::restricted());
    }

    #[tokio::test]
    async fn nothing_is_published_after_teardown() {
        let (permits, resolver) = setup(0);
        let identity = Identity::new("admin", "admin@x.com");
        let (_session_tx, session_rx) = watch::channel(SessionState::signed_in(identity));
        let tracker = AdminStatusTracker::spawn(resolver, session_rx);
        tokio::task::yield_now().await;

        let mut rx = tracker.subscribe();
        drop(tracker);
        permits.add_permits(10);
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(rx.borrow_and_update().is_loading);
        assert!(rx.changed().await.is_err());
    }
}
