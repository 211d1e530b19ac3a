use std::sync::Arc;

use serde::Serialize;

use crate::db::{
    Artwork, ArtworkRepository, ArtworkStatus, ArtworkVersion, FeedbackRepository, Project,
    ProjectRepository,
};
use crate::error::{AppError, AppResult};
use crate::services::storage::validate_object_path;
use crate::AppState;

/// Artwork with its versions, as returned to owners and link holders.
#[derive(Debug, Serialize)]
pub struct ArtworkDetail {
    #[serde(flatten)]
    pub artwork: Artwork,
    pub versions: Vec<ArtworkVersion>,
    pub feedback_count: i64,
}

#[derive(Debug, Serialize)]
pub struct ProjectDetail {
    #[serde(flatten)]
    pub project: Project,
    pub artworks: Vec<Artwork>,
}

pub struct ArtworkService;

impl ArtworkService {
    // ------------------------------------------------------------------------
    // Projects
    // ------------------------------------------------------------------------

    pub async fn create_project(
        state: &Arc<AppState>,
        owner_id: &str,
        name: &str,
    ) -> AppResult<Project> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::Validation(crate::i18n::t("validation.name_empty")));
        }

        let project = ProjectRepository::create(&state.db, owner_id, name).await?;
        tracing::info!("Created project {} for user {}", project.id, owner_id);
        Ok(project)
    }

    /// Load a project and check that `owner_id` owns it.
    pub async fn owned_project(
        state: &Arc<AppState>,
        owner_id: &str,
        project_id: &str,
    ) -> AppResult<Project> {
        let project = ProjectRepository::find_by_id(&state.db, project_id)
            .await?
            .ok_or_else(|| AppError::NotFound(crate::i18n::t("not_found.project")))?;

        if project.owner_id != owner_id {
            tracing::debug!(
                "User {} tried to access project {} owned by {}",
                owner_id,
                project.id,
                project.owner_id
            );
            return Err(AppError::ForbiddenWithReason(crate::i18n::t(
                "forbidden.not_owner",
            )));
        }

        Ok(project)
    }

    pub async fn project_detail(
        state: &Arc<AppState>,
        project: Project,
    ) -> AppResult<ProjectDetail> {
        let artworks = ArtworkRepository::list_by_project(&state.db, &project.id).await?;
        Ok(ProjectDetail { project, artworks })
    }

    // ------------------------------------------------------------------------
    // Artworks
    // ------------------------------------------------------------------------

    pub async fn create_artwork(
        state: &Arc<AppState>,
        owner_id: &str,
        title: &str,
        project_id: Option<&str>,
    ) -> AppResult<Artwork> {
        let title = title.trim();
        if title.is_empty() {
            return Err(AppError::Validation(crate::i18n::t("validation.name_empty")));
        }

        let project_id = project_id.filter(|p| !p.is_empty());
        if let Some(project_id) = project_id {
            Self::owned_project(state, owner_id, project_id).await?;
        }

        let artwork = ArtworkRepository::create(&state.db, owner_id, title, project_id).await?;
        tracing::info!("Created artwork {} for user {}", artwork.id, owner_id);
        Ok(artwork)
    }

    /// Load an artwork and check that `owner_id` owns it.
    pub async fn owned_artwork(
        state: &Arc<AppState>,
        owner_id: &str,
        artwork_id: &str,
    ) -> AppResult<Artwork> {
        let artwork = ArtworkRepository::find_by_id(&state.db, artwork_id)
            .await?
            .ok_or_else(|| AppError::NotFound(crate::i18n::t("not_found.artwork")))?;

        if artwork.owner_id != owner_id {
            tracing::debug!(
                "User {} tried to access artwork {} owned by {}",
                owner_id,
                artwork.id,
                artwork.owner_id
            );
            return Err(AppError::ForbiddenWithReason(crate::i18n::t(
                "forbidden.not_owner",
            )));
        }

        Ok(artwork)
    }

    pub async fn artwork_detail(
        state: &Arc<AppState>,
        artwork: Artwork,
    ) -> AppResult<ArtworkDetail> {
        let versions = ArtworkRepository::list_versions(&state.db, &artwork.id).await?;
        let feedback_count = FeedbackRepository::count_by_artwork(&state.db, &artwork.id).await?;
        Ok(ArtworkDetail {
            artwork,
            versions,
            feedback_count,
        })
    }

    /// Register a new file as the next version of an artwork.
    pub async fn add_version(
        state: &Arc<AppState>,
        owner_id: &str,
        artwork_id: &str,
        file_path: &str,
    ) -> AppResult<ArtworkVersion> {
        let artwork = Self::owned_artwork(state, owner_id, artwork_id).await?;
        let file_path = file_path.trim();
        validate_object_path(file_path)?;

        let version = ArtworkRepository::add_version(&state.db, &artwork.id, file_path).await?;
        tracing::info!(
            "Added version {} to artwork {}",
            version.version_number,
            artwork.id
        );
        Ok(version)
    }

    /// Close an artwork for feedback. Only open artworks can be closed.
    pub async fn close(
        state: &Arc<AppState>,
        owner_id: &str,
        artwork_id: &str,
    ) -> AppResult<Artwork> {
        let artwork = Self::owned_artwork(state, owner_id, artwork_id).await?;

        if artwork.status != ArtworkStatus::Open {
            return Err(AppError::Conflict(crate::i18n::t(
                "conflict.artwork_already_closed",
            )));
        }

        // A concurrent close may win between the read and the update.
        let closed = ArtworkRepository::close(&state.db, &artwork.id)
            .await?
            .ok_or_else(|| AppError::Conflict(crate::i18n::t("conflict.artwork_already_closed")))?;

        tracing::info!("Closed artwork {} for feedback", closed.id);
        Ok(closed)
    }
}
