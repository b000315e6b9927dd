//! Service layer API for the participation workflow
use crate::dedupe;
use crate::error::ParticipationError;
use crate::mail::MailNotifier;
use crate::participation::{Participation, ParticipationForm, SatisfactionForm, Status, TimeStamp};
use crate::stats::StatsConfig;
use crate::store::ParticipationStore;
use std::collections::HashMap;
use std::io::Read;
use std::sync::Arc;

pub struct ParticipationService<S, N> {
    pub(crate) store: Arc<S>,
    notifier: N,
    pub(crate) stats_config: StatsConfig,
}

impl<S: ParticipationStore, N: MailNotifier> ParticipationService<S, N> {
    pub fn new(store: Arc<S>, notifier: N) -> Self {
        Self {
            store,
            notifier,
            stats_config: StatsConfig::default(),
        }
    }

    pub fn with_stats_config(mut self, config: StatsConfig) -> Self {
        self.stats_config = config;
        self
    }

    /// Register a new participation.
    ///
    /// The duplicate guard runs against everything stored so far; on pass the
    /// entity is persisted as `Pending`, dated today, and a confirmation mail
    /// is attempted. Notification failure is logged and does not fail the
    /// call, the row is already saved.
    pub fn create(&self, form: &ParticipationForm) -> anyhow::Result<Participation> {
        let candidate = form.to_entity();

        dedupe::ensure_unique(self.store.as_ref(), &candidate)?;

        let saved = self.store.save(candidate)?;

        let mut variables = HashMap::new();
        variables.insert(
            "greeting".to_string(),
            format!("Merci {} !", saved.first_name),
        );
        if let Err(err) =
            self.notifier
                .send_notification(&saved.email, "email-validation-template", &variables)
        {
            tracing::warn!(id = saved.id, %err, "participation saved but confirmation mail failed");
        }

        Ok(saved)
    }

    pub fn find_all(&self) -> anyhow::Result<Vec<Participation>> {
        self.store.find_all()
    }

    pub fn find_by_id(&self, id: u64) -> anyhow::Result<Participation> {
        self.store
            .find_by_id(id)?
            .ok_or_else(|| ParticipationError::NotFound(id).into())
    }

    pub fn find_by_email(&self, email: &str) -> anyhow::Result<Option<Participation>> {
        self.store.find_by_email(email)
    }

    /// Mark a participation as validated and stamp the transition time.
    pub fn validate(&self, id: u64) -> anyhow::Result<Participation> {
        self.transition(id, Status::Validated)
    }

    /// Mark a participation as denied and stamp the transition time.
    pub fn deny(&self, id: u64) -> anyhow::Result<Participation> {
        self.transition(id, Status::Denied)
    }

    /// Mark a participation's prize as shipped and stamp the transition time.
    pub fn ship(&self, id: u64) -> anyhow::Result<Participation> {
        self.transition(id, Status::Shipped)
    }

    // No ordering guard between the three targets: any transition may fire
    // from any current state, each one overwrites status and stamp.
    fn transition(&self, id: u64, status: Status) -> anyhow::Result<Participation> {
        let updated = self.store.update(id, &|p| {
            p.status = status;
            p.status_update_date = Some(TimeStamp::new());
        })?;
        tracing::info!(id, status = ?updated.status, "participation status updated");
        Ok(updated)
    }

    /// Attach a photo to a participation. The payload is read up front so a
    /// broken upload aborts before anything is written.
    pub fn add_photo<R: Read>(
        &self,
        id: u64,
        file_name: &str,
        content_type: &str,
        mut payload: R,
    ) -> anyhow::Result<Participation> {
        let mut bytes = Vec::new();
        payload
            .read_to_end(&mut bytes)
            .map_err(|_| ParticipationError::Photo(id))?;

        self.store.update(id, &|p| {
            p.photo = Some(bytes.clone());
            p.picture_name = Some(file_name.to_string());
            p.picture_type = Some(content_type.to_string());
        })
    }

    /// Record the satisfaction survey. A form without a comment keeps any
    /// previously stored comment untouched.
    pub fn add_satisfaction(&self, form: &SatisfactionForm) -> anyhow::Result<Participation> {
        self.store.update(form.id, &|p| {
            p.satisfaction = Some(form.satisfaction);
            if let Some(comment) = &form.satisfaction_comment {
                p.satisfaction_comment = Some(comment.clone());
            }
        })
    }
}
