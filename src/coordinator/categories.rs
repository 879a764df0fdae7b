//! Category commands

use super::{KnowledgeStore, Outcome};
use crate::error::StoreError;
use crate::events::ChangeAction;
use crate::models::{Category, EntityKind};
use crate::store::{Action, Collection, Entity};
use tracing::{info, warn};

fn validate_name(name: &str) -> Result<&str, StoreError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(StoreError::validation("Category name cannot be empty"));
    }
    Ok(name)
}

impl KnowledgeStore {
    /// Create a category under `parent_path` (a root category when `None`
    /// or empty).
    ///
    /// The parent must exist and the resulting path must be new.
    pub async fn create_category(
        &self,
        name: &str,
        parent_path: Option<Vec<String>>,
    ) -> Result<Outcome<Category>, StoreError> {
        let name = validate_name(name)?;
        let parent_path = parent_path.unwrap_or_default();

        let provisional = self
            .read(|s| {
                let parent_id = if parent_path.is_empty() {
                    None
                } else {
                    match s.category_by_path(&parent_path) {
                        Some(parent) => Some(parent.id.clone()),
                        None => {
                            return Err(StoreError::validation(format!(
                                "Parent category {} does not exist",
                                parent_path.join(" / ")
                            )))
                        }
                    }
                };
                let category = Category::new(Self::provisional_id(), name, &parent_path, parent_id);
                if s.category_path_exists(&category.path) {
                    return Err(StoreError::validation(format!(
                        "Category {} already exists",
                        category.full_path
                    )));
                }
                Ok(category)
            })
            .await?;

        self.dispatch([
            Action::Upsert(Entity::Category(provisional.clone())),
            Action::BeginPending(EntityKind::Categories),
        ])
        .await;

        let parent = (!parent_path.is_empty()).then_some(parent_path.as_slice());
        match self.backend.create_category(name, parent).await {
            Ok(category) => {
                self.confirm(
                    EntityKind::Categories,
                    vec![Action::Replace {
                        provisional_id: provisional.id.clone(),
                        entity: Entity::Category(category.clone()),
                    }],
                )
                .await;
                if let Some(error) =
                    self.superseded(EntityKind::Categories, &category.id, true).await
                {
                    return Ok(Outcome::Superseded {
                        value: category,
                        error,
                    });
                }
                info!(category_id = %category.id, path = %category.full_path, "Created category");
                self.emit_changed(EntityKind::Categories, ChangeAction::Created, &category.id);
                Ok(Outcome::Confirmed(category))
            }
            Err(e) => {
                let error = self.fail(EntityKind::Categories, &e).await;
                Ok(Outcome::Kept {
                    value: provisional,
                    error,
                })
            }
        }
    }

    /// Rename a category.
    ///
    /// Descendant categories and every note filed below it are moved to the
    /// new path along with it.
    pub async fn rename_category(
        &self,
        id: &str,
        new_name: &str,
    ) -> Result<Outcome<Category>, StoreError> {
        let new_name = validate_name(new_name)?;
        self.read(|s| {
            let Some(category) = s.category(id) else {
                return Err(StoreError::not_found(EntityKind::Categories, id));
            };
            let mut renamed = category.parent_path().to_vec();
            renamed.push(new_name.to_string());
            if renamed != category.path && s.category_path_exists(&renamed) {
                return Err(StoreError::validation(format!(
                    "Category {} already exists",
                    renamed.join(" / ")
                )));
            }
            Ok(())
        })
        .await?;

        self.dispatch([
            Action::RenameCategory {
                id: id.to_string(),
                name: new_name.to_string(),
            },
            Action::BeginPending(EntityKind::Categories),
        ])
        .await;
        let renamed = self.read(|s| s.category(id).cloned()).await;

        match self.backend.rename_category(id, new_name).await {
            Ok(()) => {
                self.confirm(EntityKind::Categories, vec![]).await;
                info!(category_id = %id, name = %new_name, "Renamed category");
                self.emit_changed(EntityKind::Categories, ChangeAction::Renamed, id);
                match renamed {
                    Some(category) => Ok(Outcome::Confirmed(category)),
                    None => Err(StoreError::not_found(EntityKind::Categories, id)),
                }
            }
            Err(e) => {
                let error = self.fail(EntityKind::Categories, &e).await;
                match renamed {
                    Some(value) => Ok(Outcome::Kept { value, error }),
                    None => Err(error),
                }
            }
        }
    }

    /// Delete a category, its descendants and every note filed under them.
    ///
    /// Links and positions of the removed notes go too. Categories and notes
    /// are re-read from the backend once it confirms.
    pub async fn delete_category(&self, id: &str) -> Result<Outcome<()>, StoreError> {
        let Some(orphaned) = self
            .read(|s| {
                s.category(id).map(|category| {
                    s.notes_matching(Some(&category.path), None)
                        .into_iter()
                        .flat_map(|note| s.links_touching(&note.id))
                        .map(|link| link.id.clone())
                        .fold(Vec::new(), |mut ids, link_id| {
                            if !ids.contains(&link_id) {
                                ids.push(link_id);
                            }
                            ids
                        })
                })
            })
            .await
        else {
            return Err(StoreError::not_found(EntityKind::Categories, id));
        };

        self.dispatch([
            Action::Remove {
                kind: EntityKind::Categories,
                id: id.to_string(),
            },
            Action::BeginPending(EntityKind::Categories),
        ])
        .await;

        match self.backend.delete_category(id).await {
            Ok(()) => {
                self.delete_orphaned_links(&orphaned).await;
                self.confirm(EntityKind::Categories, vec![]).await;
                self.refresh_categories().await;
                match self.backend.list_notes().await {
                    Ok(notes) => {
                        self.dispatch([
                            Action::SetAll(Collection::Notes(notes)),
                            Action::ClearError(EntityKind::Notes),
                        ])
                        .await;
                    }
                    Err(e) => {
                        let error = StoreError::persistence(EntityKind::Notes, &e);
                        warn!(error = %error, "Failed to refresh notes after category delete");
                        self.dispatch([Action::SetError {
                            kind: EntityKind::Notes,
                            error,
                        }])
                        .await;
                    }
                }
                info!(category_id = %id, links = orphaned.len(), "Deleted category");
                self.emit_changed(EntityKind::Categories, ChangeAction::Deleted, id);
                Ok(Outcome::Confirmed(()))
            }
            Err(e) => {
                let error = self.fail(EntityKind::Categories, &e).await;
                Ok(Outcome::Kept { value: (), error })
            }
        }
    }
}
