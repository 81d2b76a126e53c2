//! Success envelope shared by every JSON endpoint.

use serde::Serialize;

use crate::access::VisibilityView;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
    /// The caller's view re-derived after a mutation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view: Option<VisibilityView>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            view: None,
        }
    }

    pub fn with_view(data: T, view: VisibilityView) -> Self {
        Self {
            success: true,
            data,
            view: Some(view),
        }
    }
}
