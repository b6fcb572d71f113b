//! Headless boards for requesters and admins.
//!
//! A board owns one [`Feed`] and exposes the actions a user can take. Action
//! failures are handled here and never propagate to the caller: validation
//! failures are dropped silently, vote failures are logged, and purchase
//! failures are logged and kept as an inline error message.
use super::auth::User;
use super::cycle::{OrderMonth, compute_effective_order_month, parse_month_filter};
use super::error::{SnackError, ValidationError};
use super::order::Order;
use super::registry::{DateField, RequestFilter, RequestRegistry, Subscription};
use super::request::{Request, VoteDirection};
use super::service::SnackService;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Holds at most one live subscription.
pub struct Feed {
    registry: RequestRegistry,
    subscription: Option<Subscription>,
}

impl Feed {
    pub fn new(registry: RequestRegistry) -> Self {
        Self {
            registry,
            subscription: None,
        }
    }

    /// Replace the current subscription with one for `filter`.
    pub fn watch(&mut self, filter: Option<RequestFilter>) {
        if let Some(previous) = self.subscription.take() {
            previous.cancel();
        }
        self.subscription = Some(self.registry.subscribe(filter));
    }

    pub fn close(&mut self) {
        if let Some(previous) = self.subscription.take() {
            previous.cancel();
        }
    }

    pub fn is_live(&self) -> bool {
        self.subscription.is_some()
    }

    pub fn filter(&self) -> Option<&RequestFilter> {
        self.subscription.as_ref().and_then(Subscription::filter)
    }

    pub fn poll(&mut self, timeout: Duration) -> Result<Option<Vec<Request>>, SnackError> {
        match self.subscription.as_mut() {
            Some(subscription) => subscription.next_timeout(timeout),
            None => Ok(None),
        }
    }
}

// the list and banner state shared by both boards
struct Listing {
    feed: Feed,
    requests: Vec<Request>,
    connectivity: Option<String>,
}

impl Listing {
    fn new(registry: RequestRegistry, filter: Option<RequestFilter>) -> Self {
        let mut feed = Feed::new(registry);
        feed.watch(filter);
        Self {
            feed,
            requests: Vec::new(),
            connectivity: None,
        }
    }

    fn refresh(&mut self, timeout: Duration) -> bool {
        match self.feed.poll(timeout) {
            Ok(Some(requests)) => {
                self.requests = requests;
                self.connectivity = None;
                true
            }
            Ok(None) => false,
            Err(e) => {
                warn!(error = %e, "request subscription failed");
                self.connectivity = Some(format!("Lost connection to the request list: {e}"));
                false
            }
        }
    }
}

/// What a signed-in user sees: every active request, newest first.
pub struct RequestBoard {
    service: Arc<SnackService>,
    user: User,
    listing: Listing,
}

impl RequestBoard {
    pub fn open(service: Arc<SnackService>, user: User) -> Self {
        let listing = Listing::new(service.requests().clone(), None);
        Self {
            service,
            user,
            listing,
        }
    }

    /// The order month a request submitted at `now` would land in.
    pub fn requested_for(now: DateTime<Utc>) -> OrderMonth {
        compute_effective_order_month(now)
    }

    /// Pull the latest snapshot, waiting up to `timeout`. Returns whether the list changed.
    pub fn refresh(&mut self, timeout: Duration) -> bool {
        self.listing.refresh(timeout)
    }

    pub fn requests(&self) -> &[Request] {
        &self.listing.requests
    }

    pub fn connectivity(&self) -> Option<&str> {
        self.listing.connectivity.as_deref()
    }

    pub fn empty_message(&self) -> Option<&'static str> {
        self.requests()
            .is_empty()
            .then_some("No snacks yet. Add your first one!")
    }

    /// Submit a request. Blank names are ignored without an error.
    pub fn submit(&mut self, name: &str, image_url: Option<&str>) -> Option<Request> {
        match self.service.submit_request(name, image_url, &self.user) {
            Ok(request) => Some(request),
            Err(e) if is_validation(&e) => {
                debug!(error = %e, "submission ignored");
                None
            }
            Err(e) => {
                warn!(error = %e, user = %self.user.uid, "failed to submit request");
                None
            }
        }
    }

    /// Vote on a request. The displayed tally only changes once the
    /// subscription delivers the stored value.
    pub fn vote(&self, request_id: &str, direction: VoteDirection) -> bool {
        match self.service.vote(request_id, direction) {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, request_id, ?direction, "failed to record vote");
                false
            }
        }
    }
}

/// The purchasing view, filtered by month of order.
pub struct AdminBoard {
    service: Arc<SnackService>,
    admin: User,
    listing: Listing,
    field: DateField,
    selected_month: Option<OrderMonth>,
    purchasing: Option<String>,
    error: Option<String>,
}

impl AdminBoard {
    /// Opens the board filtered to the current month. Non-admins are turned away.
    pub fn open(service: Arc<SnackService>, admin: User) -> Result<Self, SnackError> {
        Self::open_for(service, admin, OrderMonth::current())
    }

    pub fn open_for(
        service: Arc<SnackService>,
        admin: User,
        month: OrderMonth,
    ) -> Result<Self, SnackError> {
        if !service.is_admin(&admin) {
            return Err(SnackError::Unauthorized(admin.uid));
        }

        let field = DateField::EffectiveOrderMonth;
        let listing = Listing::new(
            service.requests().clone(),
            Some(RequestFilter::month(field, month)),
        );
        Ok(Self {
            service,
            admin,
            listing,
            field,
            selected_month: Some(month),
            purchasing: None,
            error: None,
        })
    }

    /// Filter on submission month instead of order month, or back.
    pub fn set_filter_field(&mut self, field: DateField) {
        self.field = field;
        self.rewatch();
    }

    /// Apply a `YYYY-MM` filter. An empty string clears the filter.
    pub fn select_month(&mut self, input: &str) -> Result<(), ValidationError> {
        self.selected_month = parse_month_filter(input)?;
        self.rewatch();
        Ok(())
    }

    pub fn clear_month_filter(&mut self) {
        self.selected_month = None;
        self.rewatch();
    }

    pub fn selected_month(&self) -> Option<OrderMonth> {
        self.selected_month
    }

    pub fn filter(&self) -> Option<&RequestFilter> {
        self.listing.feed.filter()
    }

    pub fn refresh(&mut self, timeout: Duration) -> bool {
        self.listing.refresh(timeout)
    }

    pub fn requests(&self) -> &[Request] {
        &self.listing.requests
    }

    pub fn connectivity(&self) -> Option<&str> {
        self.listing.connectivity.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// The request currently being purchased, if any.
    pub fn purchasing(&self) -> Option<&str> {
        self.purchasing.as_deref()
    }

    pub fn empty_message(&self) -> Option<String> {
        if !self.requests().is_empty() {
            return None;
        }
        Some(match self.selected_month {
            Some(month) => format!("No products to purchase in {}", month.short_label()),
            None => "No products to purchase".to_string(),
        })
    }

    /// Purchase a single request. Failures end up in [`AdminBoard::error`].
    pub fn purchase_one(&mut self, request_id: &str) -> Option<Order> {
        self.error = None;
        self.purchasing = Some(request_id.to_string());

        let result = self.service.purchase_one(&self.admin, request_id);
        self.purchasing = None;

        match result {
            Ok(order) => Some(order),
            Err(e) => {
                warn!(error = %e, request_id, admin = %self.admin.uid, "purchase failed");
                self.error = Some(e.to_string());
                None
            }
        }
    }

    fn rewatch(&mut self) {
        let filter = self
            .selected_month
            .map(|month| RequestFilter::month(self.field, month));
        self.listing.feed.watch(filter);
    }
}

fn is_validation(e: &anyhow::Error) -> bool {
    matches!(
        e.downcast_ref::<SnackError>(),
        Some(SnackError::Validation(_))
    )
}
