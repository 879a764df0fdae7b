//! Link commands

use super::{KnowledgeStore, Outcome};
use crate::error::StoreError;
use crate::events::ChangeAction;
use crate::models::{EntityKind, Link, NewLink};
use crate::store::{Action, EntityState, Entity};
use tracing::{debug, info, warn};

/// Check a link request against the current notes
fn validate_link(state: &EntityState, link: &NewLink) -> Result<(), StoreError> {
    if link.source_id == link.target_id {
        return Err(StoreError::validation("A note cannot be linked to itself"));
    }
    for endpoint in [&link.source_id, &link.target_id] {
        if state.note(endpoint).is_none() {
            return Err(StoreError::ReferentialIntegrity {
                note_id: endpoint.clone(),
            });
        }
    }
    Ok(())
}

impl KnowledgeStore {
    /// Create a link between two existing notes.
    ///
    /// Any number of links may join the same pair.
    pub async fn create_link(&self, link: NewLink) -> Result<Outcome<Link>, StoreError> {
        self.read(|s| validate_link(s, &link)).await?;

        let provisional = Link::from_new(Self::provisional_id(), link.clone());
        self.dispatch([
            Action::Upsert(Entity::Link(provisional.clone())),
            Action::BeginPending(EntityKind::Links),
        ])
        .await;

        match self.backend.create_link(&link).await {
            Ok(created) => {
                self.confirm(
                    EntityKind::Links,
                    vec![Action::Replace {
                        provisional_id: provisional.id.clone(),
                        entity: Entity::Link(created.clone()),
                    }],
                )
                .await;
                if let Some(error) = self.superseded(EntityKind::Links, &created.id, true).await {
                    return Ok(Outcome::Superseded {
                        value: created,
                        error,
                    });
                }
                info!(
                    link_id = %created.id,
                    source = %created.source_id,
                    target = %created.target_id,
                    link_type = %created.link_type,
                    "Created link"
                );
                self.emit_changed(EntityKind::Links, ChangeAction::Created, &created.id);
                Ok(Outcome::Confirmed(created))
            }
            Err(e) => {
                let error = self.fail(EntityKind::Links, &e).await;
                Ok(Outcome::Kept {
                    value: provisional,
                    error,
                })
            }
        }
    }

    /// Replace a link with a new one built from `changes`.
    ///
    /// Not optimistic: the old link is deleted at the backend first and only
    /// then removed locally, after which the replacement is created. Readers
    /// see the link absent between the two steps. The replacement gets a new
    /// id and goes to the end of the collection.
    ///
    /// Outcomes:
    /// - `Confirmed(Some(new))` when both steps succeed
    /// - `Kept { value: Some(old) }` when the delete failed and nothing changed
    /// - `Kept { value: None }` when the create failed; the link stays deleted
    pub async fn update_link(
        &self,
        id: &str,
        changes: NewLink,
    ) -> Result<Outcome<Option<Link>>, StoreError> {
        let existing = self
            .read(|s| {
                let existing = s
                    .link(id)
                    .cloned()
                    .ok_or_else(|| StoreError::not_found(EntityKind::Links, id))?;
                validate_link(s, &changes)?;
                Ok::<_, StoreError>(existing)
            })
            .await?;

        self.dispatch([Action::BeginPending(EntityKind::Links)]).await;

        if let Err(e) = self.backend.delete_link(id).await {
            let error = self.fail(EntityKind::Links, &e).await;
            return Ok(Outcome::Kept {
                value: Some(existing),
                error,
            });
        }
        self.dispatch([Action::Remove {
            kind: EntityKind::Links,
            id: id.to_string(),
        }])
        .await;
        debug!(link_id = %id, "Deleted link for update");
        self.emit_changed(EntityKind::Links, ChangeAction::Deleted, id);

        match self.backend.create_link(&changes).await {
            Ok(created) => {
                self.confirm(EntityKind::Links, vec![Action::Upsert(Entity::Link(created.clone()))])
                    .await;
                if let Some(error) = self.superseded(EntityKind::Links, &created.id, true).await {
                    return Ok(Outcome::Superseded {
                        value: Some(created),
                        error,
                    });
                }
                info!(old_id = %id, new_id = %created.id, "Updated link");
                self.emit_changed(EntityKind::Links, ChangeAction::Created, &created.id);
                Ok(Outcome::Confirmed(Some(created)))
            }
            Err(e) => {
                warn!(link_id = %id, "Link was deleted but its replacement could not be created");
                let error = self.fail(EntityKind::Links, &e).await;
                Ok(Outcome::Kept { value: None, error })
            }
        }
    }

    /// Delete a link
    pub async fn delete_link(&self, id: &str) -> Result<Outcome<()>, StoreError> {
        if self.read(|s| s.link(id).is_none()).await {
            return Err(StoreError::not_found(EntityKind::Links, id));
        }

        self.dispatch([
            Action::Remove {
                kind: EntityKind::Links,
                id: id.to_string(),
            },
            Action::BeginPending(EntityKind::Links),
        ])
        .await;

        match self.backend.delete_link(id).await {
            Ok(()) => {
                self.confirm(EntityKind::Links, vec![]).await;
                debug!(link_id = %id, "Deleted link");
                self.emit_changed(EntityKind::Links, ChangeAction::Deleted, id);
                Ok(Outcome::Confirmed(()))
            }
            Err(e) => {
                let error = self.fail(EntityKind::Links, &e).await;
                Ok(Outcome::Kept { value: (), error })
            }
        }
    }
}
