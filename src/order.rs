//! Purchase snapshots
use super::error::SnackError;
use super::request::{Request, TimeStamp};
use chrono::{DateTime, Utc};

/// A copy of a request as it was when it got purchased.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct OrderItem {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub name: String,
    #[n(2)]
    pub image_url: Option<String>,
    #[n(3)]
    pub upvotes: u32,
    #[n(4)]
    pub downvotes: u32,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Order {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub items: Vec<OrderItem>,
    #[n(2)]
    pub created_by: String,
    #[n(3)]
    pub created_at: TimeStamp<Utc>,
    #[n(4)]
    pub total_net_score: i64,
}

impl OrderItem {
    pub fn net_score(&self) -> i64 {
        i64::from(self.upvotes) - i64::from(self.downvotes)
    }
}

impl From<&Request> for OrderItem {
    fn from(request: &Request) -> Self {
        Self {
            id: request.id().to_string(),
            name: request.name().to_string(),
            image_url: request.image_url().map(str::to_string),
            upvotes: request.upvotes(),
            downvotes: request.downvotes(),
        }
    }
}

impl Order {
    /// Snapshot `requests` into a new order. At least one request is required.
    pub fn from_requests(
        id: String,
        requests: &[Request],
        created_by: &str,
        created_at: TimeStamp<Utc>,
    ) -> Result<Self, SnackError> {
        if requests.is_empty() {
            return Err(SnackError::EmptyPurchase);
        }

        let items: Vec<OrderItem> = requests.iter().map(OrderItem::from).collect();
        let total_net_score = items.iter().map(OrderItem::net_score).sum();

        Ok(Self {
            id,
            items,
            created_by: created_by.to_string(),
            created_at,
            total_net_score,
        })
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at.to_datetime_utc()
    }
}
