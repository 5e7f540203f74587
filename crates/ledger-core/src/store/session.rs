//! Owner session backed by a watch channel.

use tokio::sync::watch;

use super::IdentityProvider;

/// The signed-in owner, observable by the scheduler.
///
/// Authentication itself happens elsewhere; this only carries its outcome.
#[derive(Clone)]
pub struct OwnerSession {
    owner: watch::Sender<Option<i64>>,
}

impl Default for OwnerSession {
    fn default() -> Self {
        Self::new(None)
    }
}

impl OwnerSession {
    pub fn new(owner_id: Option<i64>) -> Self {
        let (owner, _) = watch::channel(owner_id);
        Self { owner }
    }

    /// Mark `owner_id` as signed in
    pub fn sign_in(&self, owner_id: i64) {
        self.owner.send_replace(Some(owner_id));
    }

    /// End the session
    pub fn sign_out(&self) {
        self.owner.send_replace(None);
    }

    /// Observe owner transitions
    pub fn subscribe(&self) -> watch::Receiver<Option<i64>> {
        self.owner.subscribe()
    }
}

impl IdentityProvider for OwnerSession {
    fn current_owner_id(&self) -> Option<i64> {
        *self.owner.borrow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_in_and_out_update_current_owner() {
        let session = OwnerSession::default();
        assert_eq!(session.current_owner_id(), None);

        session.sign_in(7);
        assert_eq!(session.current_owner_id(), Some(7));

        session.sign_out();
        assert_eq!(session.current_owner_id(), None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn subscribers_see_transitions() {
        let session = OwnerSession::new(None);
        let mut changes = session.subscribe();

        session.sign_in(3);
        changes.changed().await.unwrap();
        assert_eq!(*changes.borrow_and_update(), Some(3));
    }
}
