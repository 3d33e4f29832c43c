use linktrack_core::model::names::{ADMIN_NAME, ADMIN_NAMESPACE};
use linktrack_core::model::{LinkId, Session};
use linktrack_core::storage::{IdentityService, LinkStore};

use crate::error::SyncError;

/// A store handle acting as an authorized session.
#[derive(Debug, Clone)]
pub struct Authorized<S> {
    pub store: S,
    pub session: Session,
}

impl<S> Authorized<S> {
    /// The session's own link: root of everything this agent creates.
    pub fn agent_root(&self) -> LinkId {
        self.session.link_id
    }
}

/// Exchange an anonymous handle for one logged in as `deep/admin`:
/// guest session, resolve the admin link as guest, then log in as it.
///
/// Failures are not retried.
pub async fn bootstrap<S>(anonymous: &S) -> Result<Authorized<S>, SyncError>
where
    S: LinkStore + IdentityService,
{
    let guest = anonymous.guest().await.map_err(SyncError::Bootstrap)?;
    tracing::debug!(guest = %guest.link_id, "obtained guest session");

    let as_guest = anonymous.with_session(&guest);
    let admin = as_guest
        .id(ADMIN_NAMESPACE, ADMIN_NAME)
        .await
        .map_err(SyncError::Bootstrap)?;
    let session = as_guest.login(admin).await.map_err(SyncError::Bootstrap)?;
    tracing::info!(agent = %session.link_id, "authorized");

    Ok(Authorized {
        store: anonymous.with_session(&session),
        session,
    })
}
