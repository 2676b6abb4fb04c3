use crate::error::TldrError;
use crate::tldr::article::{Article, Label};
use crate::tldr::colors::LabelColorAllocator;
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredLabel {
    pub id: i64,
    pub caption: String,
    pub fg_color: String,
    pub bg_color: String,
}

/// The host's per-user label table. Captions are unique per owner,
/// compared case-insensitively.
pub trait LabelStore {
    fn find_by_caption(&self, owner_uid: i64, caption: &str)
    -> Result<Option<StoredLabel>, TldrError>;

    /// Returns the new label id, or `TldrError::StoreConflict` when the caption
    /// already exists for this owner.
    fn insert(
        &self,
        owner_uid: i64,
        caption: &str,
        fg_color: &str,
        bg_color: &str,
    ) -> Result<i64, TldrError>;

    /// All captions for an owner, sorted.
    fn captions_for_owner(&self, owner_uid: i64) -> Result<Vec<String>, TldrError>;

    /// Encode a label id into the article feed-id namespace.
    fn label_to_feed_id(&self, label_id: i64) -> i64;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyAttached,
    ConflictUnresolved,
    StoreFailure(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedTag {
    pub caption: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub labels: Vec<Label>,
    pub created: usize,
    pub skipped: Vec<SkippedTag>,
}

pub struct LabelReconciler<'a> {
    store: &'a dyn LabelStore,
    colors: &'a LabelColorAllocator,
}

impl<'a> LabelReconciler<'a> {
    pub fn new(store: &'a dyn LabelStore, colors: &'a LabelColorAllocator) -> Self {
        Self { store, colors }
    }

    fn to_label(&self, stored: StoredLabel) -> Label {
        Label {
            feed_encoded_id: self.store.label_to_feed_id(stored.id),
            caption: stored.caption,
            fg_color: stored.fg_color,
            bg_color: stored.bg_color,
        }
    }

    /// Find or create the label for `caption`. `Ok(None)` means a concurrent
    /// creator won the insert race and the row is still not visible.
    fn find_or_create(
        &self,
        caption: &str,
        owner_uid: i64,
    ) -> Result<Option<(Label, bool)>, TldrError> {
        if let Some(stored) = self.store.find_by_caption(owner_uid, caption)? {
            return Ok(Some((self.to_label(stored), false)));
        }

        let colors = self.colors.random_colors();
        match self
            .store
            .insert(owner_uid, caption, &colors.fg_color, &colors.bg_color)
        {
            Ok(id) => Ok(Some((
                Label {
                    feed_encoded_id: self.store.label_to_feed_id(id),
                    caption: caption.to_string(),
                    fg_color: colors.fg_color,
                    bg_color: colors.bg_color,
                },
                true,
            ))),
            Err(TldrError::StoreConflict { .. }) => {
                tracing::debug!(caption, owner_uid, "label insert conflicted; re-fetching");
                Ok(self
                    .store
                    .find_by_caption(owner_uid, caption)?
                    .map(|stored| (self.to_label(stored), false)))
            }
            Err(err) => Err(err),
        }
    }

    /// Labels to append to `article` for the suggested tags, in suggestion
    /// order. Tags matching an attached caption (case-insensitively) are skipped.
    pub fn reconcile(
        &self,
        suggested_tags: &[String],
        article: &Article,
        owner_uid: i64,
    ) -> ReconcileOutcome {
        let mut attached: BTreeSet<String> = article
            .labels
            .iter()
            .map(|label| label.caption.to_lowercase())
            .collect();
        let mut outcome = ReconcileOutcome::default();

        for caption in suggested_tags {
            let key = caption.to_lowercase();
            if attached.contains(&key) {
                outcome.skipped.push(SkippedTag {
                    caption: caption.clone(),
                    reason: SkipReason::AlreadyAttached,
                });
                continue;
            }

            match self.find_or_create(caption, owner_uid) {
                Ok(Some((label, created))) => {
                    attached.insert(key);
                    attached.insert(label.caption.to_lowercase());
                    if created {
                        outcome.created += 1;
                    }
                    outcome.labels.push(label);
                }
                Ok(None) => outcome.skipped.push(SkippedTag {
                    caption: caption.clone(),
                    reason: SkipReason::ConflictUnresolved,
                }),
                Err(err) => outcome.skipped.push(SkippedTag {
                    caption: caption.clone(),
                    reason: SkipReason::StoreFailure(err.to_string()),
                }),
            }
        }
        outcome
    }
}
