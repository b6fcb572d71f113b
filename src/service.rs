//! Service layer API for the snack request workflow
use super::auth::{AuthorizationPolicy, User};
use super::config::Config;
use super::error::{SnackError, decode, encode};
use super::order::Order;
use super::orders::OrderRecorder;
use super::registry::{RequestFilter, RequestRegistry, Subscription};
use super::request::{Request, RequestDraft, TimeStamp, VoteDirection};
use super::utils::{ORDER_HRP, new_id};
use sled::Transactional;
use sled::transaction::{ConflictableTransactionError, TransactionError, abort};
use std::sync::Arc;
use tracing::info;

pub struct SnackService {
    instance: Arc<sled::Db>,
    requests: RequestRegistry,
    orders: OrderRecorder,
    policy: Box<dyn AuthorizationPolicy>,
}

impl SnackService {
    pub fn new(
        instance: Arc<sled::Db>,
        policy: impl AuthorizationPolicy + 'static,
    ) -> anyhow::Result<Self> {
        let requests = RequestRegistry::open(&instance)?;
        let orders = OrderRecorder::open(&instance)?;

        Ok(Self {
            instance,
            requests,
            orders,
            policy: Box::new(policy),
        })
    }

    /// Open the configured database with the configured admin list.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let db = sled::open(&config.db_path)?;
        info!(path = %config.db_path.display(), "database opened");
        Self::new(Arc::new(db), config.admins.clone())
    }

    pub fn requests(&self) -> &RequestRegistry {
        &self.requests
    }

    pub fn orders(&self) -> &OrderRecorder {
        &self.orders
    }

    pub fn is_admin(&self, user: &User) -> bool {
        self.policy.is_admin(user)
    }

    /// Submit a new snack request on behalf of `owner`
    pub fn submit_request(
        &self,
        name: &str,
        image_url: Option<&str>,
        owner: &User,
    ) -> anyhow::Result<Request> {
        let mut draft = RequestDraft::new().set_name(name).set_owner(&owner.uid);
        if let Some(url) = image_url {
            draft = draft.set_image_url(url);
        }

        Ok(self.requests.create(draft)?)
    }

    pub fn vote(&self, request_id: &str, direction: VoteDirection) -> anyhow::Result<Request> {
        Ok(self.requests.vote(request_id, direction)?)
    }

    pub fn subscribe(&self, filter: Option<RequestFilter>) -> Subscription {
        self.requests.subscribe(filter)
    }

    /// Turn active requests into a single order.
    ///
    /// Removing the requests and writing the order happen in one transaction.
    /// If any request has already left the active list, for example because
    /// another admin purchased it first, nothing is written.
    pub fn purchase(&self, admin: &User, request_ids: &[&str]) -> anyhow::Result<Order> {
        if !self.policy.is_admin(admin) {
            return Err(SnackError::Unauthorized(admin.uid.clone()).into());
        }

        let mut ids: Vec<&str> = Vec::with_capacity(request_ids.len());
        for id in request_ids {
            if !ids.contains(id) {
                ids.push(*id);
            }
        }
        if ids.is_empty() {
            return Err(SnackError::EmptyPurchase.into());
        }

        let created_at = TimeStamp::new();
        let order = (self.requests.tree(), self.orders.tree())
            .transaction(|(requests, orders)| {
                let mut purchased = Vec::with_capacity(ids.len());
                for id in &ids {
                    let Some(value) = requests.remove(id.as_bytes())? else {
                        return abort(SnackError::AlreadyPurchased(id.to_string()));
                    };
                    let request: Request =
                        decode(&value).map_err(ConflictableTransactionError::Abort)?;
                    purchased.push(request);
                }

                let order_id = new_id(ORDER_HRP).map_err(ConflictableTransactionError::Abort)?;
                let order = Order::from_requests(order_id, &purchased, &admin.uid, created_at)
                    .map_err(ConflictableTransactionError::Abort)?;
                let encoded = encode(&order).map_err(ConflictableTransactionError::Abort)?;
                orders.insert(order.id.as_bytes(), encoded)?;

                Ok(order)
            })
            .map_err(|e| match e {
                TransactionError::Abort(e) => e,
                TransactionError::Storage(e) => SnackError::Storage(e),
            })?;

        info!(
            order_id = %order.id,
            admin = %admin.uid,
            items = order.items.len(),
            total_net_score = order.total_net_score,
            "purchase committed"
        );
        Ok(order)
    }

    pub fn purchase_one(&self, admin: &User, request_id: &str) -> anyhow::Result<Order> {
        self.purchase(admin, &[request_id])
    }

    /// Flush pending writes to disk.
    pub fn flush(&self) -> anyhow::Result<()> {
        self.instance.flush()?;
        Ok(())
    }
}
