//! Macro-generated test suite for the `DocumentStore` contract.
//!
//! The `document_store_tests!` macro generates a test module that drives a
//! `CrudService<Gadget>` over any store and checks the behaviour every backend
//! must share: CRUD, conflicts, filters, windows, restartable listings and
//! concurrent access.
//!
//! # Usage
//!
//! ```rust,ignore
//! #[macro_use]
//! mod storage_harness;
//!
//! use storage_harness::*;
//!
//! document_store_tests!(StoreHandle::new(InMemoryStore::new()));
//! ```
//!
//! `$factory` must evaluate to a fresh `StoreHandle`; it is re-evaluated for
//! every test, inside an async context.

#[macro_export]
macro_rules! document_store_tests {
    ($factory:expr) => {
        mod document_store_contract_tests {
            use super::*;
            use docgate::core::error::DocError;
            use docgate::core::query::{Filter, Page, Projection, SortDirection};
            use docgate::core::service::CrudService;
            use docgate::core::store::StoreHandle;
            use serde_json::json;
            use uuid::Uuid;

            async fn service() -> CrudService<Gadget> {
                let store: StoreHandle = $factory;
                install_gadgets(&store).await;
                CrudService::new(store)
            }

            async fn seed(service: &CrudService<Gadget>) {
                for (name, sku, price, stock) in [
                    ("Lamp", "LMP-1", 25.0, 4),
                    ("Kettle", "KTL-1", 40.0, 0),
                    ("Toaster", "TST-1", 35.5, 2),
                    ("Blender", "BLN-1", 80.0, 9),
                    ("Clock", "CLK-1", 12.0, 1),
                ] {
                    service
                        .create(gadget_fields(name, sku, price, stock))
                        .await
                        .unwrap();
                }
            }

            // ==================================================================
            // CRUD
            // ==================================================================

            #[tokio::test]
            async fn test_create_and_read() {
                let service = service().await;
                let created = service
                    .create(gadget_fields("Lamp", "LMP-1", 25.0, 4))
                    .await
                    .unwrap();

                let id = created.id.expect("create assigns a key");
                assert_eq!(
                    created.timestamps.date_created,
                    created.timestamps.last_updated
                );

                let read = service.read(&id).await.unwrap();
                assert_eq!(read.name, "Lamp");
                assert_eq!(read.stock, 4);
                assert!((read.price - 25.0).abs() < f64::EPSILON);
                assert_eq!(read.tags, vec!["test".to_string()]);
            }

            #[tokio::test]
            async fn test_read_missing_is_not_found() {
                let service = service().await;
                let err = service.read(&Uuid::new_v4()).await.unwrap_err();
                assert!(matches!(err, DocError::NotFound { .. }));
            }

            #[tokio::test]
            async fn test_create_requires_fields() {
                let service = service().await;
                let err = service
                    .create(fields(json!({"name": "Nameless", "sku": null})))
                    .await
                    .unwrap_err();
                assert!(err.is_validation());

                let err = service
                    .create(fields(json!({"name": "Typo", "sku": "T-1", "stock": "many"})))
                    .await
                    .unwrap_err();
                assert!(err.is_validation());
            }

            #[tokio::test]
            async fn test_duplicate_key_conflicts() {
                let service = service().await;
                let id = Uuid::new_v4();
                let mut first = gadget_fields("Lamp", "LMP-1", 25.0, 4);
                first.insert("id".into(), json!(id));
                service.create(first).await.unwrap();

                let mut second = gadget_fields("Lamp", "LMP-2", 25.0, 4);
                second.insert("id".into(), json!(id));
                let err = service.create(second).await.unwrap_err();
                assert!(err.is_conflict(), "expected conflict, got {:?}", err);
            }

            #[tokio::test]
            async fn test_unique_index_conflicts() {
                let service = service().await;
                service
                    .create(gadget_fields("Lamp", "LMP-1", 25.0, 4))
                    .await
                    .unwrap();
                let err = service
                    .create(gadget_fields("Other lamp", "LMP-1", 30.0, 1))
                    .await
                    .unwrap_err();
                assert!(err.is_conflict(), "expected conflict, got {:?}", err);
            }

            #[tokio::test]
            async fn test_update_merges_and_restamps() {
                let service = service().await;
                let created = service
                    .create(gadget_fields("Lamp", "LMP-1", 25.0, 4))
                    .await
                    .unwrap();
                let id = created.id.unwrap();

                let updated = service
                    .update(&id, fields(json!({"stock": 7, "maker": "Acme"})))
                    .await
                    .unwrap();
                assert_eq!(updated.stock, 7);
                assert_eq!(updated.maker.as_deref(), Some("Acme"));
                assert_eq!(updated.name, "Lamp");
                assert_eq!(
                    updated.timestamps.date_created,
                    created.timestamps.date_created
                );
                assert!(updated.timestamps.last_updated >= created.timestamps.last_updated);

                let read = service.read(&id).await.unwrap();
                assert_eq!(read.stock, 7);
            }

            #[tokio::test]
            async fn test_update_rejects_key_change_and_null_required() {
                let service = service().await;
                let id = service
                    .create(gadget_fields("Lamp", "LMP-1", 25.0, 4))
                    .await
                    .unwrap()
                    .id
                    .unwrap();

                let err = service
                    .update(&id, fields(json!({"id": Uuid::new_v4()})))
                    .await
                    .unwrap_err();
                assert!(err.is_validation());

                let err = service
                    .update(&id, fields(json!({"name": null})))
                    .await
                    .unwrap_err();
                assert!(err.is_validation());

                let err = service
                    .update(&Uuid::new_v4(), fields(json!({"stock": 1})))
                    .await
                    .unwrap_err();
                assert!(err.is_not_found());
            }

            #[tokio::test]
            async fn test_delete_then_read() {
                let service = service().await;
                let id = service
                    .create(gadget_fields("Lamp", "LMP-1", 25.0, 4))
                    .await
                    .unwrap()
                    .id
                    .unwrap();

                service.delete(&id).await.unwrap();
                assert!(service.read(&id).await.unwrap_err().is_not_found());
                assert!(service.delete(&id).await.unwrap_err().is_not_found());
            }

            #[tokio::test]
            async fn test_save_restamps() {
                let service = service().await;
                let mut gadget = service
                    .create(gadget_fields("Lamp", "LMP-1", 25.0, 4))
                    .await
                    .unwrap();
                let before = gadget.timestamps;

                gadget.stock = 0;
                service.save(&mut gadget).await.unwrap();
                assert!(gadget.timestamps.last_updated >= before.last_updated);
                assert_eq!(gadget.timestamps.date_created, before.date_created);

                let read = service.read(&gadget.id.unwrap()).await.unwrap();
                assert_eq!(read.stock, 0);
            }

            // ==================================================================
            // Listing
            // ==================================================================

            #[tokio::test]
            async fn test_list_filters_and_sorts() {
                let service = service().await;
                seed(&service).await;

                let in_stock = service
                    .list(
                        Filter::new()
                            .gt("stock", 0)
                            .sort_by("price", SortDirection::Descending),
                        None,
                        None,
                    )
                    .collect()
                    .await
                    .unwrap();
                let names: Vec<&str> = in_stock.iter().map(|g| g.name.as_str()).collect();
                assert_eq!(names, vec!["Blender", "Toaster", "Lamp", "Clock"]);

                let picked = service
                    .list(
                        Filter::new().is_in("sku", vec![json!("KTL-1"), json!("CLK-1")]),
                        None,
                        None,
                    )
                    .count()
                    .await
                    .unwrap();
                assert_eq!(picked, 2);

                let pattern = service
                    .list(Filter::new().matches("name", "^T"), None, None)
                    .collect()
                    .await
                    .unwrap();
                assert_eq!(pattern.len(), 1);
                assert_eq!(pattern[0].sku, "TST-1");
            }

            #[tokio::test]
            async fn test_list_pages() {
                let service = service().await;
                seed(&service).await;

                let sorted = Filter::new().sort_by("sku", SortDirection::Ascending);
                let page = service.list(sorted.clone(), None, Some(Page::new(2, 2)));
                let skus: Vec<String> = page
                    .collect()
                    .await
                    .unwrap()
                    .into_iter()
                    .map(|g| g.sku)
                    .collect();
                assert_eq!(skus, vec!["KTL-1", "LMP-1"]);
                assert_eq!(page.count().await.unwrap(), 5);

                let last = service.list(sorted, None, Some(Page::new(3, 2)));
                assert_eq!(last.collect().await.unwrap().len(), 1);
            }

            #[tokio::test]
            async fn test_listing_is_restartable() {
                let service = service().await;
                seed(&service).await;

                let listing = service.list(Filter::new(), None, None);
                assert_eq!(listing.collect().await.unwrap().len(), 5);

                service
                    .create(gadget_fields("Fan", "FAN-1", 18.0, 3))
                    .await
                    .unwrap();
                assert_eq!(listing.collect().await.unwrap().len(), 6);
                assert_eq!(listing.count().await.unwrap(), 6);
            }

            #[tokio::test]
            async fn test_projection_keeps_identity() {
                let service = service().await;
                seed(&service).await;

                let projected = service
                    .list(
                        Filter::new().eq("sku", "BLN-1"),
                        Some(Projection::new(["stock"])),
                        None,
                    )
                    .first()
                    .await
                    .unwrap()
                    .expect("one match");
                assert!(projected.id.is_some());
                assert_eq!(projected.stock, 9);
                assert_eq!(projected.name, "Blender");
                assert!(projected.tags.is_empty());
            }

            #[tokio::test]
            async fn test_find_one_and_exists() {
                let service = service().await;
                seed(&service).await;

                let clock = service
                    .find_one(Filter::new().eq("sku", "CLK-1"))
                    .await
                    .unwrap()
                    .unwrap();
                assert_eq!(clock.name, "Clock");
                assert!(
                    service
                        .find_one(Filter::new().eq("sku", "NONE"))
                        .await
                        .unwrap()
                        .is_none()
                );
                assert!(service.exists(Filter::new().lte("price", 12.0)).await.unwrap());
                assert!(!service.exists(Filter::new().gt("price", 500.0)).await.unwrap());
            }

            #[tokio::test]
            async fn test_get_many_skips_missing() {
                let service = service().await;
                seed(&service).await;
                let all = service.list(Filter::new(), None, None).collect().await.unwrap();
                let mut keys: Vec<String> =
                    all.iter().take(2).map(|g| g.id.unwrap().to_string()).collect();
                keys.push(Uuid::new_v4().to_string());

                let found = service.store().get_many("gadgets", &keys).await.unwrap();
                assert_eq!(found.len(), 2);
            }

            // ==================================================================
            // Concurrency
            // ==================================================================

            #[tokio::test]
            async fn test_concurrent_creates() {
                let service = service().await;
                let mut handles = Vec::new();
                for i in 0..10 {
                    let service = service.clone();
                    handles.push(tokio::spawn(async move {
                        service
                            .create(gadget_fields(
                                &format!("Gadget {}", i),
                                &format!("SKU-{}", i),
                                1.0,
                                1,
                            ))
                            .await
                    }));
                }
                for handle in handles {
                    handle.await.unwrap().unwrap();
                }
                let total = service.list(Filter::new(), None, None).count().await.unwrap();
                assert_eq!(total, 10);
            }
        }
    };
}
