use std::collections::HashMap;
use std::sync::Arc;

use interledger_link::Link;
use interledger_service::AccountId;
use parking_lot::RwLock;

/// The link for each connected account.
#[derive(Clone, Default)]
pub struct LinkRegistry {
    links: Arc<RwLock<HashMap<AccountId, Arc<Link>>>>,
}

impl LinkRegistry {
    pub fn new() -> Self {
        LinkRegistry::default()
    }

    /// Registers a link, returning the one it replaced.
    pub fn insert(&self, account_id: AccountId, link: Arc<Link>) -> Option<Arc<Link>> {
        self.links.write().insert(account_id, link)
    }

    pub fn get(&self, account_id: &AccountId) -> Option<Arc<Link>> {
        self.links.read().get(account_id).cloned()
    }

    pub fn remove(&self, account_id: &AccountId) -> Option<Arc<Link>> {
        self.links.write().remove(account_id)
    }

    pub fn account_ids(&self) -> Vec<AccountId> {
        let mut ids: Vec<AccountId> = self.links.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn links(&self) -> Vec<Arc<Link>> {
        self.links.read().values().cloned().collect()
    }
}
