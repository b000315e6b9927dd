//! Storage seam for participations.
//!
//! The service only talks to [`ParticipationStore`], a query-by-criteria
//! interface mirroring what the reporting side needs. [`SledStore`] is the
//! embedded implementation: one minicbor-encoded row per participation,
//! keyed by the big-endian id, every criteria query a full scan. Write
//! volume is low enough that scans are fine; a SQL-backed store would map
//! each method to an indexed query instead.
use crate::dedupe;
use crate::error::ParticipationError;
use crate::participation::{Day, Participation, Status};
use sled::transaction::{ConflictableTransactionError, TransactionError};
use std::sync::Arc;

pub trait ParticipationStore {
    /// Persist a participation, assigning a fresh id when it has none yet.
    fn save(&self, participation: Participation) -> anyhow::Result<Participation>;
    /// Atomic read-modify-write of one row. Fails with
    /// [`ParticipationError::NotFound`] and writes nothing when the id does
    /// not resolve.
    fn update(&self, id: u64, apply: &dyn Fn(&mut Participation))
    -> anyhow::Result<Participation>;
    fn find_by_id(&self, id: u64) -> anyhow::Result<Option<Participation>>;
    fn find_all(&self) -> anyhow::Result<Vec<Participation>>;
    fn find_by_email(&self, email: &str) -> anyhow::Result<Option<Participation>>;
    fn exists_by_normalized_email(&self, normalized: &str) -> anyhow::Result<bool>;
    fn exists_by_normalized_address(&self, normalized: &str) -> anyhow::Result<bool>;
    fn count_all(&self) -> anyhow::Result<u64>;
    fn count_by_date(&self, date: Day) -> anyhow::Result<u64>;
    fn count_by_date_between(&self, start: Day, end: Day) -> anyhow::Result<u64>;
    fn count_by_post_code_between(&self, low: u32, high: u32) -> anyhow::Result<u64>;
    fn count_by_product_type(&self, name: &str, ignore_case: bool) -> anyhow::Result<u64>;
    fn find_by_product_type_not_in(
        &self,
        names: &[&str],
        ignore_case: bool,
    ) -> anyhow::Result<Vec<Participation>>;
    fn count_by_satisfaction(&self, note: u8) -> anyhow::Result<u64>;
    fn count_by_satisfaction_comment_ignore_case(&self, comment: &str) -> anyhow::Result<u64>;
    fn find_by_satisfaction_comment_not_in(
        &self,
        comments: &[&str],
    ) -> anyhow::Result<Vec<Participation>>;
    /// At most 3 rows in the given status, most recent status update first.
    /// Rows never transitioned sort last; ties keep id order.
    fn top3_by_status_update_desc(&self, status: Status) -> anyhow::Result<Vec<Participation>>;
}

pub struct SledStore {
    db: Arc<sled::Db>,
}

impl SledStore {
    pub fn new(db: Arc<sled::Db>) -> Self {
        Self { db }
    }

    fn rows(&self) -> anyhow::Result<Vec<Participation>> {
        let mut rows = Vec::new();
        for entry in self.db.iter() {
            let (_, value) = entry?;
            rows.push(minicbor::decode(value.as_ref())?);
        }
        Ok(rows)
    }

    fn count_where(&self, pred: impl Fn(&Participation) -> bool) -> anyhow::Result<u64> {
        Ok(self.rows()?.iter().filter(|p| pred(p)).count() as u64)
    }

    fn product_type_matches(row: &Participation, name: &str, ignore_case: bool) -> bool {
        if ignore_case {
            row.product_type.to_lowercase() == name.to_lowercase()
        } else {
            row.product_type == name
        }
    }
}

impl ParticipationStore for SledStore {
    fn save(&self, mut participation: Participation) -> anyhow::Result<Participation> {
        if participation.id == 0 {
            // generate_id can return 0, which is our unassigned sentinel
            participation.id = self.db.generate_id()? + 1;
        }
        self.db.insert(
            participation.id.to_be_bytes(),
            minicbor::to_vec(&participation)?,
        )?;
        Ok(participation)
    }

    fn update(
        &self,
        id: u64,
        apply: &dyn Fn(&mut Participation),
    ) -> anyhow::Result<Participation> {
        let key = id.to_be_bytes();
        let result = self.db.transaction(|tx| {
            let bytes = tx.get(key)?.ok_or_else(|| {
                ConflictableTransactionError::Abort(anyhow::Error::from(
                    ParticipationError::NotFound(id),
                ))
            })?;
            let mut row: Participation = minicbor::decode(bytes.as_ref())
                .map_err(|e| ConflictableTransactionError::Abort(anyhow::Error::new(e)))?;

            apply(&mut row);

            let encoded = minicbor::to_vec(&row)
                .map_err(|e| ConflictableTransactionError::Abort(anyhow::Error::new(e)))?;
            tx.insert(&key, encoded)?;
            Ok(row)
        });

        match result {
            Ok(row) => Ok(row),
            Err(TransactionError::Abort(err)) => Err(err),
            Err(TransactionError::Storage(err)) => Err(err.into()),
        }
    }

    fn find_by_id(&self, id: u64) -> anyhow::Result<Option<Participation>> {
        match self.db.get(id.to_be_bytes())? {
            Some(bytes) => Ok(Some(minicbor::decode(bytes.as_ref())?)),
            None => Ok(None),
        }
    }

    fn find_all(&self) -> anyhow::Result<Vec<Participation>> {
        self.rows()
    }

    fn find_by_email(&self, email: &str) -> anyhow::Result<Option<Participation>> {
        Ok(self.rows()?.into_iter().find(|p| p.email == email))
    }

    fn exists_by_normalized_email(&self, normalized: &str) -> anyhow::Result<bool> {
        Ok(self
            .rows()?
            .iter()
            .any(|p| dedupe::normalized_email(&p.email) == normalized))
    }

    fn exists_by_normalized_address(&self, normalized: &str) -> anyhow::Result<bool> {
        Ok(self
            .rows()?
            .iter()
            .any(|p| dedupe::normalized_address(&p.address) == normalized))
    }

    fn count_all(&self) -> anyhow::Result<u64> {
        Ok(self.db.len() as u64)
    }

    fn count_by_date(&self, date: Day) -> anyhow::Result<u64> {
        self.count_where(|p| p.participation_date == date)
    }

    fn count_by_date_between(&self, start: Day, end: Day) -> anyhow::Result<u64> {
        self.count_where(|p| p.participation_date >= start && p.participation_date <= end)
    }

    fn count_by_post_code_between(&self, low: u32, high: u32) -> anyhow::Result<u64> {
        self.count_where(|p| p.address.post_code >= low && p.address.post_code <= high)
    }

    fn count_by_product_type(&self, name: &str, ignore_case: bool) -> anyhow::Result<u64> {
        self.count_where(|p| Self::product_type_matches(p, name, ignore_case))
    }

    fn find_by_product_type_not_in(
        &self,
        names: &[&str],
        ignore_case: bool,
    ) -> anyhow::Result<Vec<Participation>> {
        Ok(self
            .rows()?
            .into_iter()
            .filter(|p| {
                !names
                    .iter()
                    .any(|name| Self::product_type_matches(p, name, ignore_case))
            })
            .collect())
    }

    fn count_by_satisfaction(&self, note: u8) -> anyhow::Result<u64> {
        self.count_where(|p| p.satisfaction == Some(note))
    }

    fn count_by_satisfaction_comment_ignore_case(&self, comment: &str) -> anyhow::Result<u64> {
        let wanted = comment.to_lowercase();
        self.count_where(|p| {
            p.satisfaction_comment
                .as_deref()
                .is_some_and(|c| c.to_lowercase() == wanted)
        })
    }

    fn find_by_satisfaction_comment_not_in(
        &self,
        comments: &[&str],
    ) -> anyhow::Result<Vec<Participation>> {
        // rows without any comment are not "other" comments, they are absent
        Ok(self
            .rows()?
            .into_iter()
            .filter(|p| {
                p.satisfaction_comment
                    .as_deref()
                    .is_some_and(|c| !comments.contains(&c))
            })
            .collect())
    }

    fn top3_by_status_update_desc(&self, status: Status) -> anyhow::Result<Vec<Participation>> {
        let mut rows: Vec<Participation> = self
            .rows()?
            .into_iter()
            .filter(|p| p.status == status)
            .collect();
        // Option sorts None first ascending, so reversed it lands last
        let stamp = |p: &Participation| {
            p.status_update_date.as_ref().map(|t| t.to_datetime_utc())
        };
        rows.sort_by(|a, b| stamp(b).cmp(&stamp(a)));
        rows.truncate(3);
        Ok(rows)
    }
}
