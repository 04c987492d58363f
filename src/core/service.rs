//! Generic CRUD service over the document store
//!
//! `CrudService<T>` is built once per document type at startup and shared by
//! every request. Domain services wrap one and expose it through `Deref`, so
//! the generic operations stay available next to the named ones:
//!
//! ```rust,ignore
//! pub struct ProductService {
//!     crud: CrudService<Product>,
//! }
//!
//! impl Deref for ProductService {
//!     type Target = CrudService<Product>;
//!     fn deref(&self) -> &Self::Target { &self.crud }
//! }
//! ```

use crate::core::entity::{
    EntitySchema, Persistable, PrimaryKey, Timestamps, decode_document, encode_document,
};
use crate::core::error::{DocError, Result};
use crate::core::query::{Filter, Page, Projection, Query};
use crate::core::reference::{Reference, ReferenceResolver};
use crate::core::store::StoreHandle;
use futures::stream::{self, BoxStream};
use futures::{StreamExt, TryStreamExt};
use serde_json::{Map, Value};
use std::fmt;
use std::marker::PhantomData;

/// Plain field map handed in by feature handlers
pub type FieldMap = Map<String, Value>;

/// CRUD operations for one document type
pub struct CrudService<T> {
    store: StoreHandle,
    resolver: ReferenceResolver,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for CrudService<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            resolver: self.resolver.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: Persistable> fmt::Debug for CrudService<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrudService")
            .field("collection", &T::collection())
            .field("store", &self.store)
            .finish()
    }
}

fn check_required(schema: &EntitySchema, fields: &FieldMap) -> Result<()> {
    for field in schema.required {
        if fields.get(*field).is_none_or(Value::is_null) {
            return Err(DocError::field_validation(
                *field,
                format!("{} is required", field),
            ));
        }
    }
    Ok(())
}

fn build_entity<T: Persistable>(fields: FieldMap) -> Result<T> {
    serde_json::from_value(Value::Object(fields)).map_err(|e| {
        DocError::validation(format!("invalid {}: {}", T::schema().name, e))
    })
}

fn stamp(fields: &mut FieldMap, timestamps: &Timestamps) -> Result<()> {
    let stamped = serde_json::to_value(timestamps)
        .map_err(|e| DocError::validation(format!("cannot encode timestamps: {}", e)))?;
    if let Value::Object(stamped) = stamped {
        fields.extend(stamped);
    }
    Ok(())
}

impl<T: Persistable> CrudService<T> {
    pub fn new(store: StoreHandle) -> Self {
        Self {
            resolver: ReferenceResolver::new(store.clone()),
            store,
            _marker: PhantomData,
        }
    }

    pub fn store(&self) -> &StoreHandle {
        &self.store
    }

    pub fn resolver(&self) -> &ReferenceResolver {
        &self.resolver
    }

    /// Create and insert a new document
    ///
    /// A key is generated when the key type supports it and none was given.
    pub async fn create(&self, mut fields: FieldMap) -> Result<T> {
        let schema = T::schema();
        let collection = schema.collection;

        let key = match fields.get(schema.key_field).filter(|v| !v.is_null()) {
            Some(raw) => T::Key::coerce(raw).ok_or_else(|| {
                DocError::field_validation(schema.key_field, format!("malformed key: {}", raw))
            })?,
            None => T::Key::generate().ok_or_else(|| {
                DocError::field_validation(
                    schema.key_field,
                    format!("{} is required", schema.key_field),
                )
            })?,
        };
        let raw_key = serde_json::to_value(&key)
            .map_err(|e| DocError::validation(format!("cannot encode key: {}", e)))?;
        fields.insert(schema.key_field.to_string(), raw_key);

        check_required(schema, &fields)?;
        stamp(&mut fields, &Timestamps::now())?;

        let entity: T = build_entity(fields)?;
        let document = encode_document(collection, &entity)?;
        self.store
            .insert(collection, &key.to_store_key(), document)
            .await?;

        tracing::debug!(collection, key = %key, "document created");
        Ok(entity)
    }

    /// Fetch a document by key
    pub async fn read(&self, key: &T::Key) -> Result<T> {
        let collection = T::collection();
        match self.store.get(collection, &key.to_store_key()).await? {
            Some(document) => decode_document(collection, document),
            None => Err(DocError::not_found(collection, key)),
        }
    }

    /// Shallow-merge `partial` onto the stored document
    ///
    /// `date_created` is kept and `last_updated` is re-stamped; timestamps in
    /// `partial` are ignored.
    pub async fn update(&self, key: &T::Key, mut partial: FieldMap) -> Result<T> {
        let schema = T::schema();
        let collection = schema.collection;
        let store_key = key.to_store_key();

        let mut current = match self.store.get(collection, &store_key).await? {
            Some(Value::Object(current)) => current,
            Some(_) => {
                return Err(DocError::persistence(
                    format!("decode {}", collection),
                    "stored document is not an object",
                ));
            }
            None => return Err(DocError::not_found(collection, key)),
        };

        if let Some(new_key) = partial.get(schema.key_field)
            && T::Key::coerce(new_key).as_ref() != Some(key)
        {
            return Err(DocError::field_validation(
                schema.key_field,
                "the primary key cannot be changed",
            ));
        }
        for field in Timestamps::FIELDS {
            partial.remove(field);
        }

        current.extend(partial);
        check_required(schema, &current)?;

        let mut entity: T = build_entity(current)?;
        entity.timestamps_mut().touch();
        let document = encode_document(collection, &entity)?;
        self.store.upsert(collection, &store_key, document).await?;

        tracing::debug!(collection, key = %key, "document updated");
        Ok(entity)
    }

    /// Remove a document; fails if it did not exist
    pub async fn delete(&self, key: &T::Key) -> Result<()> {
        let collection = T::collection();
        if !self.store.delete(collection, &key.to_store_key()).await? {
            return Err(DocError::not_found(collection, key));
        }
        tracing::debug!(collection, key = %key, "document deleted");
        Ok(())
    }

    /// Re-stamp and write back an entity held in memory
    pub async fn save(&self, entity: &mut T) -> Result<()> {
        let schema = T::schema();
        let key = entity
            .primary_key()
            .ok_or_else(|| DocError::validation(format!("cannot save {} without a key", schema.name)))?;

        entity.timestamps_mut().touch();
        let document = encode_document(schema.collection, &*entity)?;
        if let Value::Object(fields) = &document {
            check_required(schema, fields)?;
        }
        self.store
            .upsert(schema.collection, &key.to_store_key(), document)
            .await
    }

    /// Lazy listing of matching documents
    ///
    /// Nothing is read until the listing is consumed. A projection always
    /// keeps the key, the timestamps and every required field, so projected
    /// documents still decode as `T`.
    pub fn list(
        &self,
        filter: Filter,
        projection: Option<Projection>,
        page: Option<Page>,
    ) -> Listing<T> {
        let schema = T::schema();
        let projection = projection.map(|projection| {
            projection
                .including([schema.key_field])
                .including(Timestamps::FIELDS)
                .including(schema.required.iter().copied())
        });

        Listing {
            store: self.store.clone(),
            query: Query::new(filter)
                .with_projection(projection)
                .with_page(page),
            _marker: PhantomData,
        }
    }

    /// First document matching the filter
    pub async fn find_one(&self, filter: Filter) -> Result<Option<T>> {
        self.list(filter, None, None).first().await
    }

    /// Whether any document matches the filter
    pub async fn exists(&self, filter: Filter) -> Result<bool> {
        Ok(self.store.count(T::collection(), &filter).await? > 0)
    }

    /// Resolve a reference held by a `T`, honouring `T`'s auto-dereference flag
    pub async fn resolve<R: Persistable>(&self, reference: &Reference<R>) -> Result<Reference<R>> {
        self.resolver.resolve_for::<T, R>(reference).await
    }
}

/// A finite, restartable sequence of documents
///
/// Each call to [`Listing::stream`] runs the query again.
pub struct Listing<T> {
    store: StoreHandle,
    query: Query,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Persistable> Listing<T> {
    pub fn query(&self) -> &Query {
        &self.query
    }

    /// Stream the documents
    pub fn stream(&self) -> BoxStream<'static, Result<T>> {
        let store = self.store.clone();
        let query = self.query.clone();
        let collection = T::collection();

        stream::once(async move { store.query(collection, &query).await })
            .try_flatten()
            .map(move |document| document.and_then(|doc| decode_document(collection, doc)))
            .boxed()
    }

    pub async fn collect(&self) -> Result<Vec<T>> {
        self.stream().try_collect().await
    }

    pub async fn first(&self) -> Result<Option<T>> {
        let mut query = self.query.clone();
        query.limit = Some(1);
        let first = Listing::<T> {
            store: self.store.clone(),
            query,
            _marker: PhantomData,
        };
        first.stream().try_next().await
    }

    /// Number of matching documents, ignoring the page window
    pub async fn count(&self) -> Result<u64> {
        self.store
            .count(T::collection(), &self.query.filter)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::entity::Timestamps;
    use crate::core::query::SortDirection;
    use crate::storage::InMemoryStore;
    use serde::{Deserialize, Serialize};
    use serde_json::json;
    use uuid::Uuid;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Note {
        id: Option<Uuid>,
        title: String,
        #[serde(default)]
        body: Option<String>,
        #[serde(default)]
        rank: i64,
        #[serde(flatten)]
        timestamps: Timestamps,
    }

    crate::impl_document!(Note,
        key: id: Uuid,
        collection: "notes",
        name: "note",
        required: ["title"],
    );

    fn fields(value: Value) -> FieldMap {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    fn service() -> (InMemoryStore, CrudService<Note>) {
        let store = InMemoryStore::new();
        let service = CrudService::new(StoreHandle::new(store.clone()));
        (store, service)
    }

    #[tokio::test]
    async fn test_create_generates_key_and_stamps() {
        let (_store, notes) = service();
        let note = notes.create(fields(json!({"title": "hello"}))).await.unwrap();
        assert!(note.id.is_some());
        assert_eq!(note.timestamps.date_created, note.timestamps.last_updated);

        let read = notes.read(&note.id.unwrap()).await.unwrap();
        assert_eq!(read.title, "hello");
    }

    #[tokio::test]
    async fn test_create_validates() {
        let (_store, notes) = service();
        let err = notes.create(fields(json!({"body": "x"}))).await.unwrap_err();
        assert!(err.is_validation());

        let err = notes
            .create(fields(json!({"title": null})))
            .await
            .unwrap_err();
        assert!(err.is_validation());

        let err = notes
            .create(fields(json!({"title": "t", "rank": "high"})))
            .await
            .unwrap_err();
        assert!(err.is_validation());

        let err = notes
            .create(fields(json!({"id": "not-a-uuid", "title": "t"})))
            .await
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_duplicate_key_conflicts() {
        let (_store, notes) = service();
        let id = Uuid::new_v4();
        notes
            .create(fields(json!({"id": id, "title": "a"})))
            .await
            .unwrap();
        let err = notes
            .create(fields(json!({"id": id, "title": "b"})))
            .await
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_update_merges_and_restamps() {
        let (_store, notes) = service();
        let note = notes
            .create(fields(json!({"title": "a", "body": "keep"})))
            .await
            .unwrap();
        let id = note.id.unwrap();

        let updated = notes
            .update(
                &id,
                fields(json!({"rank": 3, "date_created": "1999-01-01T00:00:00Z"})),
            )
            .await
            .unwrap();
        assert_eq!(updated.rank, 3);
        assert_eq!(updated.body.as_deref(), Some("keep"));
        assert_eq!(updated.timestamps.date_created, note.timestamps.date_created);
        assert!(updated.timestamps.last_updated >= note.timestamps.last_updated);

        let err = notes
            .update(&id, fields(json!({"id": Uuid::new_v4()})))
            .await
            .unwrap_err();
        assert!(err.is_validation());

        let err = notes
            .update(&id, fields(json!({"title": null})))
            .await
            .unwrap_err();
        assert!(err.is_validation());

        let err = notes
            .update(&Uuid::new_v4(), FieldMap::new())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_delete_then_read() {
        let (_store, notes) = service();
        let id = notes
            .create(fields(json!({"title": "gone"})))
            .await
            .unwrap()
            .id
            .unwrap();

        notes.delete(&id).await.unwrap();
        assert!(notes.read(&id).await.unwrap_err().is_not_found());
        assert!(notes.delete(&id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_listing_is_lazy_and_restartable() {
        let (store, notes) = service();
        for rank in 0..5 {
            notes
                .create(fields(json!({"title": format!("n{}", rank), "rank": rank})))
                .await
                .unwrap();
        }

        let before = store.operation_count();
        let listing = notes.list(
            Filter::new()
                .gte("rank", 1)
                .sort_by("rank", SortDirection::Descending),
            None,
            Some(Page::new(1, 3)),
        );
        assert_eq!(store.operation_count(), before);

        let first: Vec<i64> = listing.collect().await.unwrap().iter().map(|n| n.rank).collect();
        let again: Vec<i64> = listing.collect().await.unwrap().iter().map(|n| n.rank).collect();
        assert_eq!(first, vec![4, 3, 2]);
        assert_eq!(first, again);
        assert_eq!(listing.count().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_projection_keeps_key_and_required() {
        let (_store, notes) = service();
        notes
            .create(fields(json!({"title": "t", "body": "hidden", "rank": 7})))
            .await
            .unwrap();

        let listed = notes
            .list(Filter::new(), Some(Projection::new(["rank"])), None)
            .collect()
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert!(listed[0].id.is_some());
        assert_eq!(listed[0].title, "t");
        assert_eq!(listed[0].rank, 7);
        assert_eq!(listed[0].body, None);
    }

    #[tokio::test]
    async fn test_find_one_exists_and_save() {
        let (_store, notes) = service();
        let mut note = notes.create(fields(json!({"title": "x"}))).await.unwrap();

        assert!(notes.exists(Filter::new().eq("title", "x")).await.unwrap());
        assert!(!notes.exists(Filter::new().eq("title", "y")).await.unwrap());

        note.rank = 9;
        let before = note.timestamps.last_updated;
        notes.save(&mut note).await.unwrap();
        assert!(note.timestamps.last_updated >= before);

        let found = notes
            .find_one(Filter::new().eq("rank", 9))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, note.id);

        let mut unsaved = note.clone();
        unsaved.id = None;
        assert!(notes.save(&mut unsaved).await.unwrap_err().is_validation());
    }

    #[tokio::test]
    async fn test_unreachable_store() {
        let (store, notes) = service();
        store.set_unavailable(true);
        let err = notes.create(fields(json!({"title": "x"}))).await.unwrap_err();
        assert!(err.is_persistence());
        let err = notes.list(Filter::new(), None, None).collect().await.unwrap_err();
        assert!(err.is_persistence());
    }
}
