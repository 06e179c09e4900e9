//! In-memory per-user carts.
//!
//! Carts live in a moka cache keyed by user id and are evicted after a
//! period of inactivity. Each cart sits behind its own mutex so two
//! requests from the same user apply one after the other.

use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::cart::ParlayCart;
use crate::config::CartConfig;

pub type SharedCart = Arc<Mutex<ParlayCart>>;

#[derive(Clone)]
pub struct CartStore {
    carts: Cache<Uuid, SharedCart>,
}

impl CartStore {
    pub fn new(config: &CartConfig) -> Self {
        let carts = Cache::builder()
            .max_capacity(config.max_carts)
            .time_to_idle(Duration::from_secs(config.idle_minutes * 60))
            .build();
        Self { carts }
    }

    /// Fetch the user's cart, creating an empty one on first use.
    pub async fn cart_for(&self, user_id: Uuid) -> SharedCart {
        self.carts
            .get_with(user_id, async { Arc::new(Mutex::new(ParlayCart::new())) })
            .await
    }

    /// Run `f` against the user's cart while holding its lock.
    pub async fn with_cart<T>(&self, user_id: Uuid, f: impl FnOnce(&mut ParlayCart) -> T) -> T {
        let cart = self.cart_for(user_id).await;
        let mut guard = cart.lock().await;
        f(&mut guard)
    }

    pub async fn discard(&self, user_id: Uuid) {
        self.carts.invalidate(&user_id).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::sample_pick;

    fn store() -> CartStore {
        CartStore::new(&CartConfig::default())
    }

    #[tokio::test]
    async fn carts_are_isolated_per_user() {
        let store = store();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        store
            .with_cart(alice, |cart| cart.add_pick(sample_pick("a", 150)))
            .await
            .unwrap();

        assert_eq!(store.with_cart(alice, |c| c.pick_count()).await, 1);
        assert_eq!(store.with_cart(bob, |c| c.pick_count()).await, 0);
    }

    #[tokio::test]
    async fn discard_starts_a_fresh_cart() {
        let store = store();
        let user = Uuid::new_v4();
        store.with_cart(user, |c| c.set_stake(300.0)).await;
        store.discard(user).await;
        assert_eq!(store.with_cart(user, |c| c.stake()).await, 10.0);
    }
}
