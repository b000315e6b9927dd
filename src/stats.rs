//! Read-side aggregations over the participation set.
//!
//! Everything here is a pure query: nothing mutates, and every function is
//! total on an empty store (zero-filled counts, empty lists).
use crate::mail::MailNotifier;
use crate::participation::{Day, Status};
use crate::service::ParticipationService;
use crate::store::ParticipationStore;
use chrono::Weekday;

/// Product names counted as their own bucket; everything else is "autre".
pub const CANONICAL_PRODUCT_TYPES: [&str; 3] = ["Insecticide", "Herbicide", "Fongicide"];

/// Survey comments counted as their own bucket.
pub const CANONICAL_SATISFACTION_COMMENTS: [&str; 4] = [
    "C'était trop long",
    "C'était trop court",
    "L'appareil ne fonctionnait pas",
    "Informations pas claires",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct StatsConfig {
    /// When set, the canonical product buckets (and the "autre" exclusion)
    /// match case-insensitively instead of the default exact match.
    pub product_type_ignore_case: bool,
}

/// Composite read-model for the statistics dashboard.
#[derive(Debug, Clone, PartialEq)]
pub struct Stats {
    pub total_participation: u64,
    pub last_5_months: [u64; 5],
    pub by_province: Vec<(String, u64)>,
    pub by_product_type: Vec<(String, u64)>,
    pub other_product_names: Vec<String>,
    pub notes: [u64; 3],
    pub satisfaction_comments: Vec<(String, u64)>,
    pub other_satisfaction_comments: Vec<String>,
}

/// Composite read-model for the admin landing view.
#[derive(Debug, Clone, PartialEq)]
pub struct Dashboard {
    pub total_participants: u64,
    pub week: Vec<(String, u64)>,
    pub last_3_pending: Vec<u64>,
    pub last_3_validated: Vec<u64>,
}

impl<S: ParticipationStore, N: MailNotifier> ParticipationService<S, N> {
    /// Daily counts walking backward from `first_day`: slot i is the count
    /// for `first_day - i` days.
    pub fn get_week(&self, first_day: Day) -> anyhow::Result<[u64; 7]> {
        let mut week = [0u64; 7];
        for (i, slot) in week.iter_mut().enumerate() {
            *slot = self.store.count_by_date(first_day.minus_days(i as u64))?;
        }
        Ok(week)
    }

    /// Counts for the calendar week containing today, keyed by weekday name,
    /// Monday first.
    pub fn get_week_with_days(&self) -> anyhow::Result<Vec<(String, u64)>> {
        let monday = Day::today().monday_of_week();
        let mut days = Vec::with_capacity(7);
        for i in 0..7 {
            let date = monday.plus_days(i);
            days.push((
                day_name(date.weekday()).to_string(),
                self.store.count_by_date(date)?,
            ));
        }
        Ok(days)
    }

    pub fn count_participation(&self) -> anyhow::Result<u64> {
        self.store.count_all()
    }

    /// Monthly totals, slot 0 = the current calendar month, slot i = i months
    /// back, full month bounds inclusive.
    pub fn count_participation_last_5_months(&self) -> anyhow::Result<[u64; 5]> {
        let today = Day::today();
        let mut counts = [0u64; 5];
        for (i, slot) in counts.iter_mut().enumerate() {
            let start = today.first_of_month_back(i as u32);
            *slot = self.store.count_by_date_between(start, start.end_of_month())?;
        }
        Ok(counts)
    }

    /// Histogram over the Walloon provinces by postal-code range. The bounds
    /// are the campaign's literal ranges: gaps and the split Hainaut range
    /// are intentional.
    pub fn count_by_province(&self) -> anyhow::Result<Vec<(String, u64)>> {
        Ok(vec![
            (
                "Brabant Wallon".to_string(),
                self.store.count_by_post_code_between(1300, 1499)?,
            ),
            (
                "Liège".to_string(),
                self.store.count_by_post_code_between(4000, 4999)?,
            ),
            (
                "Namur".to_string(),
                self.store.count_by_post_code_between(5000, 5680)?,
            ),
            (
                "Hainaut".to_string(),
                self.store.count_by_post_code_between(6000, 6599)?
                    + self.store.count_by_post_code_between(7000, 7999)?,
            ),
            (
                "Luxembourg".to_string(),
                self.store.count_by_post_code_between(6600, 6999)?,
            ),
        ])
    }

    /// Counts for the three canonical products plus an "autre" bucket for
    /// everything else.
    pub fn count_by_product_type(&self) -> anyhow::Result<Vec<(String, u64)>> {
        let ignore_case = self.stats_config.product_type_ignore_case;
        let mut buckets = Vec::with_capacity(4);
        for name in CANONICAL_PRODUCT_TYPES {
            buckets.push((
                name.to_lowercase(),
                self.store.count_by_product_type(name, ignore_case)?,
            ));
        }
        let others = self
            .store
            .find_by_product_type_not_in(&CANONICAL_PRODUCT_TYPES, ignore_case)?;
        buckets.push(("autre".to_string(), others.len() as u64));
        Ok(buckets)
    }

    /// Distinct product names in the "autre" bucket, first-seen order.
    pub fn other_product_type(&self) -> anyhow::Result<Vec<String>> {
        let others = self.store.find_by_product_type_not_in(
            &CANONICAL_PRODUCT_TYPES,
            self.stats_config.product_type_ignore_case,
        )?;
        let mut names: Vec<String> = Vec::new();
        for row in others {
            if !names.contains(&row.product_type) {
                names.push(row.product_type);
            }
        }
        Ok(names)
    }

    /// Counts for satisfaction ratings 1, 2 and 3, in that order.
    pub fn count_notes(&self) -> anyhow::Result<[u64; 3]> {
        let mut notes = [0u64; 3];
        for (i, slot) in notes.iter_mut().enumerate() {
            *slot = self.store.count_by_satisfaction(i as u8 + 1)?;
        }
        Ok(notes)
    }

    /// Case-insensitive counts for the four canonical survey comments.
    pub fn count_satisfaction_comments(&self) -> anyhow::Result<Vec<(String, u64)>> {
        let mut comments = Vec::with_capacity(4);
        for comment in CANONICAL_SATISFACTION_COMMENTS {
            comments.push((
                comment.to_string(),
                self.store.count_by_satisfaction_comment_ignore_case(comment)?,
            ));
        }
        Ok(comments)
    }

    /// Free-text comments outside the canonical four. The exclusion is
    /// case-sensitive; rows without a comment do not appear.
    pub fn all_other_satisfaction_comments(&self) -> anyhow::Result<Vec<String>> {
        Ok(self
            .store
            .find_by_satisfaction_comment_not_in(&CANONICAL_SATISFACTION_COMMENTS)?
            .into_iter()
            .filter_map(|p| p.satisfaction_comment)
            .collect())
    }

    /// Ids of the up-to-3 most recently status-updated pending participations.
    pub fn last_3_pending(&self) -> anyhow::Result<Vec<u64>> {
        self.last_3_in(Status::Pending)
    }

    /// Ids of the up-to-3 most recently status-updated validated participations.
    pub fn last_3_validated(&self) -> anyhow::Result<Vec<u64>> {
        self.last_3_in(Status::Validated)
    }

    fn last_3_in(&self, status: Status) -> anyhow::Result<Vec<u64>> {
        Ok(self
            .store
            .top3_by_status_update_desc(status)?
            .into_iter()
            .map(|p| p.id)
            .collect())
    }

    pub fn stats_snapshot(&self) -> anyhow::Result<Stats> {
        Ok(Stats {
            total_participation: self.count_participation()?,
            last_5_months: self.count_participation_last_5_months()?,
            by_province: self.count_by_province()?,
            by_product_type: self.count_by_product_type()?,
            other_product_names: self.other_product_type()?,
            notes: self.count_notes()?,
            satisfaction_comments: self.count_satisfaction_comments()?,
            other_satisfaction_comments: self.all_other_satisfaction_comments()?,
        })
    }

    pub fn dashboard_snapshot(&self) -> anyhow::Result<Dashboard> {
        Ok(Dashboard {
            total_participants: self.count_participation()?,
            week: self.get_week_with_days()?,
            last_3_pending: self.last_3_pending()?,
            last_3_validated: self.last_3_validated()?,
        })
    }
}

fn day_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "MONDAY",
        Weekday::Tue => "TUESDAY",
        Weekday::Wed => "WEDNESDAY",
        Weekday::Thu => "THURSDAY",
        Weekday::Fri => "FRIDAY",
        Weekday::Sat => "SATURDAY",
        Weekday::Sun => "SUNDAY",
    }
}
