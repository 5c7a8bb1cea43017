//! Connection registry: connection id to seller record.

use std::collections::BTreeMap;

use crate::seller::Seller;

pub struct ConnectionRegistry<Id> {
    sellers: BTreeMap<Id, Seller<Id>>,
}

impl<Id: Clone + Ord> ConnectionRegistry<Id> {
    pub fn new() -> Self {
        Self {
            sellers: BTreeMap::new(),
        }
    }

    /// Insert a new seller. On a duplicate id nothing changes and the current count is returned as error.
    pub fn insert(&mut self, seller: Seller<Id>) -> Result<usize, usize> {
        if self.sellers.contains_key(seller.id()) {
            return Err(self.sellers.len());
        }
        self.sellers.insert(seller.id().clone(), seller);
        Ok(self.sellers.len())
    }

    pub fn remove(&mut self, id: &Id) -> Option<Seller<Id>> {
        self.sellers.remove(id)
    }

    pub fn get(&self, id: &Id) -> Option<&Seller<Id>> {
        self.sellers.get(id)
    }

    pub fn get_mut(&mut self, id: &Id) -> Option<&mut Seller<Id>> {
        self.sellers.get_mut(id)
    }

    pub fn contains(&self, id: &Id) -> bool {
        self.sellers.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.sellers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sellers.is_empty()
    }

    /// Ids in ascending order. Owned so callers can mutate the registry while walking them.
    pub fn ids(&self) -> Vec<Id> {
        self.sellers.keys().cloned().collect()
    }

    /// Ids of sellers matching `pred`, ascending.
    pub fn ids_where(&self, pred: impl Fn(&Seller<Id>) -> bool) -> Vec<Id> {
        self.sellers
            .values()
            .filter(|s| pred(s))
            .map(|s| s.id().clone())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Seller<Id>> {
        self.sellers.values()
    }

    pub fn joined_count(&self) -> usize {
        self.sellers.values().filter(|s| s.has_joined()).count()
    }
}

impl<Id: Clone + Ord> Default for ConnectionRegistry<Id> {
    fn default() -> Self {
        Self::new()
    }
}
