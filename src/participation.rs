//! Core participation entity, its owned address value and submission forms
use chrono::{DateTime, Datelike, Days, NaiveDate, TimeZone, Utc, Weekday};

/// Review status of a participation. Every record starts out as `Pending`;
/// the three other states are set by the lifecycle operations.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, Eq, PartialEq)]
pub enum Status {
    #[n(0)]
    Pending,
    #[n(1)]
    Validated,
    #[n(2)]
    Denied,
    #[n(3)]
    Shipped,
}

/// Postal address owned by exactly one participation. It has no identity of
/// its own and lives and dies with its record.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Eq, PartialEq)]
pub struct Address {
    #[n(0)]
    pub street: String,
    #[n(1)]
    pub city: String,
    #[n(2)]
    pub post_code: u32,
}

// Key in the store is the big-endian encoding of `id`.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq)]
pub struct Participation {
    // 0 means not yet persisted; the store assigns the real id on first save
    #[n(0)]
    pub id: u64,
    #[n(1)]
    pub participation_date: Day,
    #[n(2)]
    pub first_name: String,
    #[n(3)]
    pub last_name: String,
    #[n(4)]
    pub email: String,
    #[n(5)]
    pub address: Address,
    #[n(6)]
    pub status: Status,
    // None until the first validate/deny/ship transition
    #[n(7)]
    pub status_update_date: Option<TimeStamp<Utc>>,
    #[n(8)]
    pub picture_name: Option<String>,
    #[n(9)]
    pub picture_type: Option<String>,
    #[cbor(n(10), with = "minicbor::bytes")]
    pub photo: Option<Vec<u8>>,
    #[n(11)]
    pub product_type: String,
    #[n(12)]
    pub satisfaction: Option<u8>,
    #[n(13)]
    pub satisfaction_comment: Option<String>,
    #[n(14)]
    pub accept_newsletter: bool,
    #[n(15)]
    pub accept_exposure: bool,
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone)]
pub struct TimeStamp<T: TimeZone>(DateTime<T>);

/// Calendar day without a time component, used for participation dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Day(NaiveDate);

impl TimeStamp<Utc> {
    pub fn new() -> Self {
        Self(Utc::now())
    }
    pub fn new_with(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> Self {
        Utc.with_ymd_and_hms(year, month, day, hour, min, sec)
            .unwrap()
            .into()
    }
    pub fn to_datetime_utc(&self) -> DateTime<Utc> {
        self.0
    }
}

impl Default for TimeStamp<Utc> {
    fn default() -> Self {
        Self::new()
    }
}

impl Day {
    pub fn today() -> Self {
        Self(Utc::now().date_naive())
    }
    pub fn new_with(year: i32, month: u32, day: u32) -> Self {
        Self(NaiveDate::from_ymd_opt(year, month, day).expect("valid calendar date"))
    }
    pub fn minus_days(self, days: u64) -> Self {
        Self(
            self.0
                .checked_sub_days(Days::new(days))
                .expect("date arithmetic stayed in range"),
        )
    }
    pub fn plus_days(self, days: u64) -> Self {
        Self(
            self.0
                .checked_add_days(Days::new(days))
                .expect("date arithmetic stayed in range"),
        )
    }
    /// First day of the month `months` before this one's.
    pub fn first_of_month_back(self, months: u32) -> Self {
        let first = self.0.with_day(1).expect("every month has a day 1");
        Self(
            first
                .checked_sub_months(chrono::Months::new(months))
                .expect("date arithmetic stayed in range"),
        )
    }
    /// Last day of this day's month.
    pub fn end_of_month(self) -> Self {
        let first = self.0.with_day(1).expect("every month has a day 1");
        let next = first
            .checked_add_months(chrono::Months::new(1))
            .expect("date arithmetic stayed in range");
        Self(next.pred_opt().expect("month start always has a predecessor"))
    }
    /// Monday of the calendar week this day falls in.
    pub fn monday_of_week(self) -> Self {
        Self(self.0.week(Weekday::Mon).first_day())
    }
    pub fn weekday(self) -> Weekday {
        self.0.weekday()
    }
    pub fn to_naive_date(self) -> NaiveDate {
        self.0
    }
}

impl From<NaiveDate> for Day {
    fn from(value: NaiveDate) -> Self {
        Day(value)
    }
}

/// Submission form for a new participation, in chained-setter style.
///
/// `to_entity` ignores any status carried by the form: a created
/// participation is always `Pending` and dated with the creation day.
#[derive(Debug, Default, Clone)]
pub struct ParticipationForm {
    first_name: String,
    last_name: String,
    email: String,
    status: Option<Status>,
    product_type: String,
    street: String,
    city: String,
    post_code: u32,
    accept_newsletter: bool,
    accept_exposure: bool,
}

impl ParticipationForm {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_first_name(mut self, first_name: &str) -> Self {
        self.first_name = first_name.to_string();
        self
    }
    pub fn set_last_name(mut self, last_name: &str) -> Self {
        self.last_name = last_name.to_string();
        self
    }
    pub fn set_email(mut self, email: &str) -> Self {
        self.email = email.to_string();
        self
    }
    pub fn set_status(mut self, status: Status) -> Self {
        self.status = Some(status);
        self
    }
    pub fn set_product_type(mut self, product_type: &str) -> Self {
        self.product_type = product_type.to_string();
        self
    }
    pub fn set_street(mut self, street: &str) -> Self {
        self.street = street.to_string();
        self
    }
    pub fn set_city(mut self, city: &str) -> Self {
        self.city = city.to_string();
        self
    }
    pub fn set_post_code(mut self, post_code: u32) -> Self {
        self.post_code = post_code;
        self
    }
    pub fn set_accept_newsletter(mut self, accept: bool) -> Self {
        self.accept_newsletter = accept;
        self
    }
    pub fn set_accept_exposure(mut self, accept: bool) -> Self {
        self.accept_exposure = accept;
        self
    }
    pub fn email(&self) -> &str {
        &self.email
    }
    pub fn first_name(&self) -> &str {
        &self.first_name
    }
    /// Build the entity that gets persisted for this submission.
    pub fn to_entity(&self) -> Participation {
        Participation {
            id: 0,
            participation_date: Day::today(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email: self.email.clone(),
            address: Address {
                street: self.street.clone(),
                city: self.city.clone(),
                post_code: self.post_code,
            },
            status: Status::Pending,
            status_update_date: None,
            picture_name: None,
            picture_type: None,
            photo: None,
            product_type: self.product_type.clone(),
            satisfaction: None,
            satisfaction_comment: None,
            accept_newsletter: self.accept_newsletter,
            accept_exposure: self.accept_exposure,
        }
    }
}

/// Follow-up satisfaction survey. The comment is optional; when absent a
/// previously stored comment is kept as-is.
#[derive(Debug, Clone)]
pub struct SatisfactionForm {
    pub id: u64,
    pub satisfaction: u8,
    pub satisfaction_comment: Option<String>,
}

impl SatisfactionForm {
    pub fn new(id: u64, satisfaction: u8) -> Self {
        Self {
            id,
            satisfaction,
            satisfaction_comment: None,
        }
    }
    pub fn with_comment(mut self, comment: &str) -> Self {
        self.satisfaction_comment = Some(comment.to_string());
        self
    }
}

impl<C> minicbor::Encode<C> for TimeStamp<Utc> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        if let Some(nsec) = self.0.timestamp_nanos_opt() {
            return e.i64(nsec)?.ok();
        }

        Err(minicbor::encode::Error::message(
            "failed to encode timestamp. timestamp_nanos_opt returned None",
        ))
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TimeStamp<Utc> {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let nsecs = d.i64()?;

        Ok(TimeStamp(DateTime::from_timestamp_nanos(nsecs)))
    }
}

impl<T: TimeZone> From<DateTime<T>> for TimeStamp<T> {
    fn from(value: DateTime<T>) -> Self {
        TimeStamp(value)
    }
}

impl<C> minicbor::Encode<C> for Day {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.i32(self.0.num_days_from_ce())?.ok()
    }
}

impl<'b, C> minicbor::Decode<'b, C> for Day {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let days = d.i32()?;

        NaiveDate::from_num_days_from_ce_opt(days)
            .map(Day)
            .ok_or(minicbor::decode::Error::message(
                "failed to convert day count to a calendar date",
            ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_encoding() {
        let original = TimeStamp::new();

        let encoding = minicbor::to_vec(&original).unwrap();
        let decode: TimeStamp<Utc> = minicbor::decode(&encoding).unwrap();

        assert_eq!(original, decode);
    }

    #[test]
    fn day_encoding() {
        let original = Day::new_with(2024, 2, 29);

        let encoding = minicbor::to_vec(original).unwrap();
        let decode: Day = minicbor::decode(&encoding).unwrap();

        assert_eq!(original, decode);
    }

    #[test]
    fn participation_encoding() {
        let original = ParticipationForm::new()
            .set_first_name("Alice")
            .set_last_name("Smith")
            .set_email("alice@domain.com")
            .set_product_type("Insecticide")
            .set_street("Rue du Paradis 12")
            .set_city("Liège")
            .set_post_code(4000)
            .set_accept_newsletter(true)
            .set_accept_exposure(false)
            .to_entity();

        let encoding = minicbor::to_vec(&original).unwrap();
        let decode: Participation = minicbor::decode(&encoding).unwrap();

        assert_eq!(original, decode);
    }

    #[test]
    fn form_always_yields_pending_dated_today() {
        let entity = ParticipationForm::new()
            .set_email("alice@domain.com")
            .set_status(Status::Shipped)
            .to_entity();

        assert_eq!(entity.status, Status::Pending);
        assert_eq!(entity.participation_date, Day::today());
        assert!(entity.status_update_date.is_none());
    }
}
