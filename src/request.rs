//! Snack requests, their drafts and the voting rules
use super::cycle::{OrderMonth, compute_effective_order_month};
use super::error::ValidationError;
use chrono::{DateTime, TimeZone, Utc};

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
pub struct TimeStamp<T: TimeZone>(DateTime<T>)
where
    T::Offset: Copy;

impl TimeStamp<Utc> {
    pub fn new() -> Self {
        Self(Utc::now())
    }
    pub fn from_ymd_hms(
        year: i32,
        month: u32,
        day: u32,
        hour: u32,
        min: u32,
        sec: u32,
    ) -> Option<Self> {
        Utc.with_ymd_and_hms(year, month, day, hour, min, sec)
            .single()
            .map(Self)
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

impl From<DateTime<Utc>> for TimeStamp<Utc> {
    fn from(value: DateTime<Utc>) -> Self {
        TimeStamp(value)
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

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteDirection {
    #[n(0)]
    Up,
    #[n(1)]
    Down,
}

/// A user's snack proposal while it is still on the active list.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Request {
    #[n(0)]
    id: String, // bech32 encoded uuid7, assigned by the registry
    #[n(1)]
    name: String,
    #[n(2)]
    image_url: Option<String>,
    #[n(3)]
    upvotes: u32,
    #[n(4)]
    downvotes: u32,
    #[n(5)]
    created_at: TimeStamp<Utc>,
    #[n(6)]
    effective_order_month: TimeStamp<Utc>, // midnight UTC on the 1st of the target month
    #[n(7)]
    owner: String,
}

/// Used for constructing new requests before the registry assigns an id.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RequestDraft {
    name: String,
    image_url: Option<String>,
    owner: String,
    created_at: Option<TimeStamp<Utc>>,
}

/// Partial tally update. Fields left as `None` are untouched.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RequestUpdate {
    pub upvotes: Option<u32>,
    pub downvotes: Option<u32>,
}

impl RequestDraft {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }
    pub fn set_image_url(mut self, url: &str) -> Self {
        self.image_url = Some(url.to_string());
        self
    }
    pub fn set_owner(mut self, owner: &str) -> Self {
        self.owner = owner.to_string();
        self
    }
    /// Pin the creation time. Defaults to the moment the draft is finalised.
    pub fn set_created_at(mut self, created_at: TimeStamp<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }
    /// Trims the fields, stamps the effective order month and produces the request.
    pub fn validate_and_finalise(self, id: String) -> Result<Request, ValidationError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyName);
        }

        let image_url = self
            .image_url
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty());

        let created_at = self.created_at.unwrap_or_default();
        let effective_order_month =
            compute_effective_order_month(created_at.to_datetime_utc()).first_instant();

        Ok(Request {
            id,
            name: name.to_string(),
            image_url,
            upvotes: 0,
            downvotes: 0,
            created_at,
            effective_order_month: effective_order_month.into(),
            owner: self.owner.trim().to_string(),
        })
    }
}

impl Request {
    pub fn id(&self) -> &str {
        &self.id
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn image_url(&self) -> Option<&str> {
        self.image_url.as_deref()
    }
    /// The stored image, or `placeholder` when the request has none.
    pub fn image_or<'a>(&'a self, placeholder: &'a str) -> &'a str {
        self.image_url().unwrap_or(placeholder)
    }
    pub fn upvotes(&self) -> u32 {
        self.upvotes
    }
    pub fn downvotes(&self) -> u32 {
        self.downvotes
    }
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at.to_datetime_utc()
    }
    pub fn effective_order_month(&self) -> DateTime<Utc> {
        self.effective_order_month.to_datetime_utc()
    }
    pub fn order_month(&self) -> OrderMonth {
        OrderMonth::of(self.effective_order_month())
    }
    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn net_score(&self) -> i64 {
        i64::from(self.upvotes) - i64::from(self.downvotes)
    }

    /// Adds exactly one vote in `direction`. The other tally is untouched.
    pub fn apply_vote(mut self, direction: VoteDirection) -> Self {
        match direction {
            VoteDirection::Up => self.upvotes = self.upvotes.saturating_add(1),
            VoteDirection::Down => self.downvotes = self.downvotes.saturating_add(1),
        }
        self
    }

    /// Tallies only ever grow.
    pub fn apply_update(mut self, update: RequestUpdate) -> Result<Self, ValidationError> {
        let upvotes = update.upvotes.unwrap_or(self.upvotes);
        let downvotes = update.downvotes.unwrap_or(self.downvotes);
        if upvotes < self.upvotes || downvotes < self.downvotes {
            return Err(ValidationError::TallyDecrease(self.id));
        }

        self.upvotes = upvotes;
        self.downvotes = downvotes;
        Ok(self)
    }
}

/// "+3", "+0" or "-1"
pub fn format_net_score(net: i64) -> String {
    if net >= 0 {
        format!("+{net}")
    } else {
        net.to_string()
    }
}
