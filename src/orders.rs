//! Append-only store of purchase orders
use super::error::{Result, SnackError, decode, encode};
use super::order::Order;
use sled::Tree;
use tracing::info;

pub const ORDERS_TREE: &str = "orders";

#[derive(Debug, Clone)]
pub struct OrderRecorder {
    tree: Tree,
}

impl OrderRecorder {
    pub fn open(db: &sled::Db) -> Result<Self> {
        Ok(Self {
            tree: db.open_tree(ORDERS_TREE)?,
        })
    }

    pub(crate) fn tree(&self) -> &Tree {
        &self.tree
    }

    /// Store a new order. An existing order is never overwritten.
    pub fn create(&self, order: &Order) -> Result<String> {
        let written = self
            .tree
            .compare_and_swap(&order.id, None::<&[u8]>, Some(encode(order)?))?;
        if written.is_err() {
            return Err(SnackError::OrderExists(order.id.clone()));
        }

        info!(order_id = %order.id, items = order.items.len(), "order recorded");
        Ok(order.id.clone())
    }

    pub fn get(&self, id: &str) -> Result<Option<Order>> {
        self.tree
            .get(id)?
            .map(|value| decode(&value))
            .transpose()
    }

    /// Every order, most recent purchase first.
    pub fn list(&self) -> Result<Vec<Order>> {
        let mut orders = self
            .tree
            .iter()
            .values()
            .map(|value| decode::<Order>(&value?))
            .collect::<Result<Vec<_>>>()?;

        orders.sort_by(|a, b| b.created_at().cmp(&a.created_at()).then_with(|| b.id.cmp(&a.id)));
        Ok(orders)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::OrderItem;
    use crate::request::TimeStamp;
    use tempfile::tempdir;

    fn order(id: &str) -> Order {
        Order {
            id: id.to_string(),
            items: vec![OrderItem {
                id: "snack_a".into(),
                name: "Chips".into(),
                image_url: None,
                upvotes: 2,
                downvotes: 1,
            }],
            created_by: "admin".into(),
            created_at: TimeStamp::new(),
            total_net_score: 1,
        }
    }

    #[test]
    fn orders_are_append_only() {
        let temp_dir = tempdir().unwrap();
        let db = sled::open(temp_dir.path().join("orders.db")).unwrap();
        let recorder = OrderRecorder::open(&db).unwrap();

        let original = order("order_1");
        let id = recorder.create(&original).unwrap();
        assert_eq!(recorder.get(&id).unwrap(), Some(original));

        let mut replacement = order("order_1");
        replacement.total_net_score = 99;
        assert!(matches!(
            recorder.create(&replacement),
            Err(SnackError::OrderExists(_))
        ));
        assert_eq!(recorder.get(&id).unwrap().unwrap().total_net_score, 1);
        assert_eq!(recorder.list().unwrap().len(), 1);
    }
}
