use serde::{Deserialize, Serialize};

use super::link::LinkId;

/// An identity issued by the store's identity service.
///
/// `link_id` is the link the session acts as. For an authorized session it is
/// the agent root that owns every marker this process creates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub link_id: LinkId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl Session {
    pub fn new(link_id: LinkId, token: Option<String>) -> Self {
        Self { link_id, token }
    }
}
