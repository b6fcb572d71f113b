//! The active request list, stored in a sled tree and watchable for changes.
//!
//! Every read goes through [`RequestRegistry::list`], which decodes the tree,
//! applies an optional month filter and sorts newest first. A [`Subscription`]
//! re-runs that query whenever the tree changes and hands out the new snapshot,
//! so viewers never patch their lists by hand. An idle subscription costs
//! nothing and never holds up writers.
use super::cycle::{MonthRange, OrderMonth};
use super::error::{Result, SnackError, decode, encode};
use super::request::{Request, RequestDraft, RequestUpdate, VoteDirection};
use super::utils::{REQUEST_HRP, new_id};
use super::watch::ChangeSignal;
use chrono::{DateTime, Utc};
use sled::Tree;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

pub const REQUESTS_TREE: &str = "requests";

/// Which timestamp of a request a month filter applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateField {
    CreatedAt,
    EffectiveOrderMonth,
}

impl DateField {
    pub fn value(self, request: &Request) -> DateTime<Utc> {
        match self {
            DateField::CreatedAt => request.created_at(),
            DateField::EffectiveOrderMonth => request.effective_order_month(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestFilter {
    pub field: DateField,
    pub range: MonthRange,
}

impl RequestFilter {
    pub fn month(field: DateField, month: OrderMonth) -> Self {
        Self {
            field,
            range: month.range(),
        }
    }

    pub fn matches(&self, request: &Request) -> bool {
        self.range.contains(self.field.value(request))
    }
}

#[derive(Debug, Clone)]
pub struct RequestRegistry {
    tree: Tree,
    changes: Arc<ChangeSignal>,
}

impl RequestRegistry {
    /// Opens the `requests` tree and starts watching it for changes.
    pub fn open(db: &sled::Db) -> Result<Self> {
        let tree = db.open_tree(REQUESTS_TREE)?;
        let changes = ChangeSignal::watch(&tree)?;
        Ok(Self { tree, changes })
    }

    pub(crate) fn tree(&self) -> &Tree {
        &self.tree
    }

    /// Assigns an id, stamps the order month and stores the request.
    pub fn create(&self, draft: RequestDraft) -> Result<Request> {
        let request = draft.validate_and_finalise(new_id(REQUEST_HRP)?)?;
        self.tree.insert(request.id(), encode(&request)?)?;

        info!(
            request_id = request.id(),
            order_month = %request.order_month(),
            "request created"
        );
        Ok(request)
    }

    pub fn get(&self, id: &str) -> Result<Option<Request>> {
        self.tree
            .get(id)?
            .map(|value| decode(&value))
            .transpose()
    }

    pub fn vote(&self, id: &str, direction: VoteDirection) -> Result<Request> {
        let request = self.modify(id, |request| Ok(request.apply_vote(direction)))?;
        debug!(request_id = id, ?direction, "vote recorded");
        Ok(request)
    }

    pub fn update(&self, id: &str, update: RequestUpdate) -> Result<Request> {
        self.modify(id, |request| Ok(request.apply_update(update)?))
    }

    pub fn delete(&self, id: &str) -> Result<()> {
        match self.tree.remove(id)? {
            Some(_) => Ok(()),
            None => Err(SnackError::NotFound(id.to_string())),
        }
    }

    /// All requests matching `filter`, newest first by the filtered field
    /// (or by creation time when unfiltered).
    pub fn list(&self, filter: Option<&RequestFilter>) -> Result<Vec<Request>> {
        let mut requests = Vec::new();
        for value in self.tree.iter().values() {
            let request: Request = decode(&value?)?;
            if filter.is_none_or(|filter| filter.matches(&request)) {
                requests.push(request);
            }
        }

        let field = filter.map_or(DateField::CreatedAt, |filter| filter.field);
        requests.sort_by(|a, b| {
            field
                .value(b)
                .cmp(&field.value(a))
                .then_with(|| b.created_at().cmp(&a.created_at()))
                .then_with(|| b.id().cmp(a.id()))
        });
        Ok(requests)
    }

    /// Watch the registry. The first pull yields the current snapshot.
    pub fn subscribe(&self, filter: Option<RequestFilter>) -> Subscription {
        Subscription {
            registry: self.clone(),
            filter,
            seen: 0,
            last: None,
        }
    }

    // read, transform, compare-and-swap; retried when another writer got in first
    fn modify<F>(&self, id: &str, transform: F) -> Result<Request>
    where
        F: Fn(Request) -> Result<Request>,
    {
        loop {
            let Some(current) = self.tree.get(id)? else {
                return Err(SnackError::NotFound(id.to_string()));
            };
            let updated = transform(decode(&current)?)?;

            match self
                .tree
                .compare_and_swap(id, Some(&current), Some(encode(&updated)?))?
            {
                Ok(()) => return Ok(updated),
                Err(_) => debug!(request_id = id, "concurrent write, retrying"),
            }
        }
    }
}

/// A live view of the registry. Dropping it (or calling [`Subscription::cancel`])
/// stops delivery.
pub struct Subscription {
    registry: RequestRegistry,
    filter: Option<RequestFilter>,
    seen: u64,
    last: Option<Vec<Request>>,
}

impl Subscription {
    pub fn filter(&self) -> Option<&RequestFilter> {
        self.filter.as_ref()
    }

    /// The next snapshot that differs from the previous one, or `None` if
    /// nothing changed within `timeout`.
    pub fn next_timeout(&mut self, timeout: Duration) -> Result<Option<Vec<Request>>> {
        if self.last.is_none() {
            return self.snapshot();
        }

        let deadline = Instant::now().checked_add(timeout);
        loop {
            let remaining =
                deadline.map(|deadline| deadline.saturating_duration_since(Instant::now()));
            let Some(version) = self.registry.changes.wait_past(self.seen, remaining)? else {
                return Ok(None);
            };
            self.seen = version;
            if let Some(snapshot) = self.refresh()? {
                return Ok(Some(snapshot));
            }
        }
    }

    pub fn cancel(self) {}

    // read the version before the list so a write in between is seen next time
    fn snapshot(&mut self) -> Result<Option<Vec<Request>>> {
        self.seen = self.registry.changes.version();
        self.refresh()
    }

    fn refresh(&mut self) -> Result<Option<Vec<Request>>> {
        let snapshot = self.registry.list(self.filter.as_ref())?;
        if self.last.as_ref() == Some(&snapshot) {
            return Ok(None);
        }
        self.last = Some(snapshot.clone());
        Ok(Some(snapshot))
    }
}

impl Iterator for Subscription {
    type Item = Result<Vec<Request>>;

    /// Blocks until the snapshot changes.
    fn next(&mut self) -> Option<Self::Item> {
        if self.last.is_none() {
            return self.snapshot().transpose();
        }

        loop {
            // a closed registry ends the stream
            self.seen = self.registry.changes.wait_past(self.seen, None).ok()??;
            match self.refresh() {
                Ok(Some(snapshot)) => return Some(Ok(snapshot)),
                Ok(None) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::TimeStamp;
    use tempfile::tempdir;

    fn registry() -> (tempfile::TempDir, sled::Db, RequestRegistry) {
        let temp_dir = tempdir().unwrap();
        let db = sled::open(temp_dir.path().join("registry.db")).unwrap();
        let registry = RequestRegistry::open(&db).unwrap();
        (temp_dir, db, registry)
    }

    fn draft(name: &str, ts: TimeStamp<Utc>) -> RequestDraft {
        RequestDraft::new()
            .set_name(name)
            .set_owner("user_1")
            .set_created_at(ts)
    }

    #[test]
    fn lists_newest_first() {
        let (_dir, _db, registry) = registry();
        let older = TimeStamp::from_ymd_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let newer = TimeStamp::from_ymd_hms(2024, 3, 2, 0, 0, 0).unwrap();

        registry.create(draft("older", older)).unwrap();
        registry.create(draft("newer", newer)).unwrap();

        let names: Vec<_> = registry
            .list(None)
            .unwrap()
            .iter()
            .map(|r| r.name().to_string())
            .collect();
        assert_eq!(names, ["newer", "older"]);
    }

    #[test]
    fn filters_by_either_field() {
        let (_dir, _db, registry) = registry();
        // created in January, ordered for February
        let january = TimeStamp::from_ymd_hms(2024, 1, 5, 0, 0, 0).unwrap();
        registry.create(draft("chips", january)).unwrap();

        let by_created = RequestFilter::month(DateField::CreatedAt, OrderMonth::new(2024, 1));
        let by_order = RequestFilter::month(DateField::EffectiveOrderMonth, OrderMonth::new(2024, 2));
        let wrong = RequestFilter::month(DateField::EffectiveOrderMonth, OrderMonth::new(2024, 1));

        assert_eq!(registry.list(Some(&by_created)).unwrap().len(), 1);
        assert_eq!(registry.list(Some(&by_order)).unwrap().len(), 1);
        assert!(registry.list(Some(&wrong)).unwrap().is_empty());
    }

    #[test]
    fn vote_and_delete_missing_request() {
        let (_dir, _db, registry) = registry();

        assert!(matches!(
            registry.vote("snack_missing", VoteDirection::Up),
            Err(SnackError::NotFound(_))
        ));
        assert!(matches!(
            registry.delete("snack_missing"),
            Err(SnackError::NotFound(_))
        ));
    }

    #[test]
    fn subscription_sees_votes() {
        let (_dir, _db, registry) = registry();
        let request = registry.create(draft("chips", TimeStamp::new())).unwrap();

        let mut subscription = registry.subscribe(None);
        let first = subscription.next_timeout(Duration::ZERO).unwrap().unwrap();
        assert_eq!(first[0].upvotes(), 0);

        registry.vote(request.id(), VoteDirection::Up).unwrap();

        let next = subscription
            .next_timeout(Duration::from_secs(5))
            .unwrap()
            .unwrap();
        assert_eq!(next[0].upvotes(), 1);

        // nothing else happened
        assert!(subscription
            .next_timeout(Duration::from_millis(50))
            .unwrap()
            .is_none());
    }

    #[test]
    fn idle_subscription_does_not_block_writers() {
        let (_dir, _db, registry) = registry();
        let request = registry.create(draft("chips", TimeStamp::new())).unwrap();

        let mut idle = registry.subscribe(None);
        let first = idle.next_timeout(Duration::ZERO).unwrap().unwrap();
        assert_eq!(first[0].upvotes(), 0);
        // not polled again while the votes go in

        let writer = registry.clone();
        let id = request.id().to_string();
        let (done, finished) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            for _ in 0..3000 {
                writer.vote(&id, VoteDirection::Up).unwrap();
            }
            done.send(()).unwrap();
        });

        finished
            .recv_timeout(Duration::from_secs(60))
            .expect("writes stalled behind an idle subscription");

        let snapshot = idle
            .next_timeout(Duration::from_secs(5))
            .unwrap()
            .unwrap();
        assert_eq!(snapshot[0].upvotes(), 3000);
    }
}
