use std::collections::HashSet;

use serde_json::{Map, Value};

use super::{Document, DocumentStore, Query, SetOptions, StoreError, WriteOp};

/// Wraps a real store and fails selected writes.
pub struct FlakyStore<'a> {
    inner: &'a dyn DocumentStore,
    failing_updates: HashSet<(String, String)>,
    failing_set_collections: HashSet<String>,
    fail_batches: bool,
    fail_queries: bool,
}

impl<'a> FlakyStore<'a> {
    pub fn new(inner: &'a dyn DocumentStore) -> Self {
        Self {
            inner,
            failing_updates: HashSet::new(),
            failing_set_collections: HashSet::new(),
            fail_batches: false,
            fail_queries: false,
        }
    }

    pub fn fail_update(mut self, collection: &str, id: &str) -> Self {
        self.failing_updates
            .insert((collection.to_string(), id.to_string()));
        self
    }

    pub fn fail_sets_in(mut self, collection: &str) -> Self {
        self.failing_set_collections.insert(collection.to_string());
        self
    }

    pub fn fail_batches(mut self) -> Self {
        self.fail_batches = true;
        self
    }

    pub fn fail_queries(mut self) -> Self {
        self.fail_queries = true;
        self
    }
}

fn injected(what: &str) -> StoreError {
    StoreError::Unavailable(format!("injected failure: {what}"))
}

impl DocumentStore for FlakyStore<'_> {
    fn query(&self, collection: &str, query: &Query) -> Result<Vec<Document>, StoreError> {
        if self.fail_queries {
            return Err(injected(&format!("query {collection}")));
        }
        self.inner.query(collection, query)
    }

    fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        self.inner.get(collection, id)
    }

    fn set(
        &self,
        collection: &str,
        id: &str,
        data: &Value,
        options: SetOptions,
    ) -> Result<(), StoreError> {
        if self.failing_set_collections.contains(collection) {
            return Err(injected(&format!("set {collection}/{id}")));
        }
        self.inner.set(collection, id, data, options)
    }

    fn update(
        &self,
        collection: &str,
        id: &str,
        patch: &Map<String, Value>,
    ) -> Result<(), StoreError> {
        if self
            .failing_updates
            .contains(&(collection.to_string(), id.to_string()))
        {
            return Err(injected(&format!("update {collection}/{id}")));
        }
        self.inner.update(collection, id, patch)
    }

    fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        self.inner.delete(collection, id)
    }

    fn commit_batch(&self, ops: &[WriteOp]) -> Result<(), StoreError> {
        if self.fail_batches {
            return Err(injected("batch"));
        }
        self.inner.commit_batch(ops)
    }

    fn run_atomic(
        &self,
        body: &mut dyn FnMut(&dyn DocumentStore) -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        self.inner.run_atomic(&mut |_| body(self))
    }
}
