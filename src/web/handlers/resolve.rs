//! `GET /resolve`: path resolution and folder listing.

use axum::{
    extract::{Query, State},
    Json,
};
use std::sync::Arc;

use crate::model::DirectoryEntry;
use crate::path::Resolution;
use crate::web::dto::{ApiResponse, EntryResponse, ResolveQuery, ResolveResponse, ResolvedKind};
use crate::web::error::{ApiError, ChallengeDetail};
use crate::web::handlers::AppState;
use crate::web::middleware::AccessTokens;

fn entry_response(state: &AppState, entry: DirectoryEntry) -> Result<EntryResponse, ApiError> {
    let file_token = if entry.is_folder {
        None
    } else {
        Some(state.gateway.seal_id(&entry.id)?)
    };
    Ok(EntryResponse::from_entry(entry, file_token))
}

/// GET /resolve - Resolve a virtual path.
///
/// Folders answer with one page of their children, files with their own
/// entry and stream token. A locked folder on the way answers 401 with a
/// challenge.
pub async fn resolve(
    State(state): State<Arc<AppState>>,
    tokens: AccessTokens,
    Query(query): Query<ResolveQuery>,
) -> Result<Json<ApiResponse<ResolveResponse>>, ApiError> {
    let resolution = state
        .gateway
        .resolve(&query.path, tokens.as_slice())
        .await?;

    let (id, entry, breadcrumb, protected) = match resolution {
        Resolution::Resolved {
            id,
            entry,
            breadcrumb,
            protected,
        } => (id, entry, breadcrumb, protected),
        Resolution::Challenge {
            segment_index,
            folder_label,
            folder_token,
            breadcrumb,
        } => {
            tracing::debug!(segment_index, "Path requires a password");
            return Err(ApiError::password_required(ChallengeDetail {
                protection_required: true,
                protected_path_token: folder_token,
                folder: folder_label,
                segment_index,
                breadcrumb,
            }));
        }
    };

    let response = if entry.is_folder {
        let page = state
            .gateway
            .list_page(&id, query.cursor.as_deref())
            .await?;
        let entries = page
            .entries
            .into_iter()
            .map(|e| entry_response(&state, e))
            .collect::<Result<Vec<_>, _>>()?;

        ResolveResponse {
            kind: ResolvedKind::Folder,
            breadcrumb,
            entries: Some(entries),
            file: None,
            protection_required: false,
            protected,
            next_cursor: page.next_cursor,
        }
    } else {
        ResolveResponse {
            kind: ResolvedKind::File,
            breadcrumb,
            entries: None,
            file: Some(entry_response(&state, entry)?),
            protection_required: false,
            protected,
            next_cursor: None,
        }
    };

    Ok(Json(ApiResponse::new(response)))
}
