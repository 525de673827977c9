mod common;

use common::{TestApp, order_request, variant_item};
use storefront_api::{
    dto::products::{
        CreateProductRequest, CreateVariantRequest, ImageSelection, UpdateProductRequest,
        VariantUpsert,
    },
    error::AppError,
    models::{LineItemTarget, OrderStatus, ShippingMethod},
    services::{catalog, orders},
    store::{
        CatalogRepo, NewOrder, NewOrderItem, NewProductImage, OrderRepo, ReferenceRepo, StoreOp,
    },
};

fn keep(id: i64) -> ImageSelection {
    ImageSelection {
        id,
        is_primary: false,
    }
}

fn upsert(id: Option<i64>, name: &str, stock: i32) -> VariantUpsert {
    VariantUpsert {
        id,
        name: name.to_string(),
        stock_quantity: stock,
        image_url: None,
    }
}

#[tokio::test]
async fn first_upload_becomes_primary() -> anyhow::Result<()> {
    let app = TestApp::new()?;
    let product = app.product("Roses").await?;

    let first = app.upload(product.id, "a.png").await?;
    let second = app.upload(product.id, "b.png").await?;

    assert!(first.is_primary);
    assert!(!second.is_primary);
    assert!(app.blobs.contains(&first.image_url));
    assert!(first.image_url.contains(&format!("/{}/", product.id)));
    assert!(first.image_url.ends_with("a.png"));
    Ok(())
}

#[tokio::test]
async fn dropping_the_primary_promotes_earliest_remaining() -> anyhow::Result<()> {
    let app = TestApp::new()?;
    let product = app.product("Roses").await?;
    let a = app.upload(product.id, "a.png").await?;
    let b = app.upload(product.id, "b.png").await?;
    let c = app.upload(product.id, "c.png").await?;

    let patch = UpdateProductRequest {
        product_images: Some(vec![keep(c.id), keep(b.id)]),
        ..Default::default()
    };
    let detail = catalog::apply_product_update(&app.state, product.id, patch).await?;

    let ids: Vec<i64> = detail.product_images.iter().map(|i| i.id).collect();
    assert_eq!(ids, vec![b.id, c.id]);
    assert_eq!(app.primary_ids(product.id).await?, vec![b.id]);
    assert!(!app.blobs.contains(&a.image_url));
    assert_eq!(app.blobs.len(), 2);
    Ok(())
}

#[tokio::test]
async fn explicit_primary_flag_wins() -> anyhow::Result<()> {
    let app = TestApp::new()?;
    let product = app.product("Roses").await?;
    let a = app.upload(product.id, "a.png").await?;
    let b = app.upload(product.id, "b.png").await?;

    let patch = UpdateProductRequest {
        product_images: Some(vec![
            keep(a.id),
            ImageSelection {
                id: b.id,
                is_primary: true,
            },
        ]),
        ..Default::default()
    };
    catalog::apply_product_update(&app.state, product.id, patch).await?;

    assert_eq!(app.primary_ids(product.id).await?, vec![b.id]);
    Ok(())
}

#[tokio::test]
async fn empty_image_list_removes_everything() -> anyhow::Result<()> {
    let app = TestApp::new()?;
    let product = app.product("Roses").await?;
    app.upload(product.id, "a.png").await?;
    app.upload(product.id, "b.png").await?;

    let patch = UpdateProductRequest {
        product_images: Some(Vec::new()),
        ..Default::default()
    };
    let detail = catalog::apply_product_update(&app.state, product.id, patch).await?;

    assert!(detail.product_images.is_empty());
    assert!(app.blobs.is_empty());
    Ok(())
}

#[tokio::test]
async fn invalid_image_sets_change_nothing() -> anyhow::Result<()> {
    let app = TestApp::new()?;
    let product = app.product("Roses").await?;
    let other = app.product("Tulips").await?;
    let a = app.upload(product.id, "a.png").await?;
    let b = app.upload(product.id, "b.png").await?;
    let foreign = app.upload(other.id, "c.png").await?;

    let stray = UpdateProductRequest {
        name: Some("Renamed".into()),
        product_images: Some(vec![keep(foreign.id)]),
        ..Default::default()
    };
    let err = catalog::apply_product_update(&app.state, product.id, stray)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let two_primaries = UpdateProductRequest {
        product_images: Some(vec![
            ImageSelection {
                id: a.id,
                is_primary: true,
            },
            ImageSelection {
                id: b.id,
                is_primary: true,
            },
        ]),
        ..Default::default()
    };
    let err = catalog::apply_product_update(&app.state, product.id, two_primaries)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    assert_eq!(app.images(product.id).await?.len(), 2);
    assert_eq!(app.primary_ids(product.id).await?, vec![a.id]);
    let stored = app.store.find_product(product.id).await?.unwrap();
    assert_eq!(stored.name, "Roses");
    Ok(())
}

#[tokio::test]
async fn variants_reconcile_by_id() -> anyhow::Result<()> {
    let app = TestApp::new()?;
    let product = app.product("Roses").await?;
    let kept = app.variant(product.id, "Small").await?;
    let dropped = app.variant(product.id, "Large").await?;

    let patch = UpdateProductRequest {
        product_variants: Some(vec![
            upsert(Some(kept.id), "Small bunch", 9),
            upsert(None, "Huge", 1),
        ]),
        ..Default::default()
    };
    let detail = catalog::apply_product_update(&app.state, product.id, patch).await?;

    assert_eq!(detail.product_variants.len(), 2);
    assert!(app.store.find_variant(dropped.id).await?.is_none());
    let updated = app.store.find_variant(kept.id).await?.unwrap();
    assert_eq!(updated.name, "Small bunch");
    assert_eq!(updated.stock_quantity, 9);
    let inserted = detail
        .product_variants
        .iter()
        .find(|v| v.id != kept.id)
        .unwrap();
    assert_eq!(inserted.name, "Huge");
    assert_eq!(inserted.product_id, product.id);
    Ok(())
}

#[tokio::test]
async fn scalar_fields_update_with_collections_untouched() -> anyhow::Result<()> {
    let app = TestApp::new()?;
    let product = app.product("Roses").await?;
    let image = app.upload(product.id, "a.png").await?;
    let variant = app.variant(product.id, "Small").await?;

    let patch = UpdateProductRequest {
        price: Some(2500),
        ..Default::default()
    };
    let detail = catalog::apply_product_update(&app.state, product.id, patch).await?;

    assert_eq!(detail.product.price, 2500);
    assert_eq!(detail.product.name, "Roses");
    assert_eq!(detail.product_images[0].id, image.id);
    assert_eq!(detail.product_variants[0].id, variant.id);
    Ok(())
}

#[tokio::test]
async fn missing_product_is_not_found() -> anyhow::Result<()> {
    let app = TestApp::new()?;
    let err = catalog::apply_product_update(&app.state, 404, UpdateProductRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let err = app.upload(404, "a.png").await.unwrap_err();
    assert!(err.to_string().contains("not found"));
    assert!(app.blobs.is_empty());
    Ok(())
}

#[tokio::test]
async fn referenced_variant_blocks_reconciliation() -> anyhow::Result<()> {
    let app = TestApp::new()?;
    let customer = app.customer().await?;
    let product = app.product("Roses").await?;
    let image = app.upload(product.id, "a.png").await?;
    let kept = app.variant(product.id, "Small").await?;
    let ordered = app.variant(product.id, "Large").await?;
    orders::create_order(
        &app.state,
        order_request(customer.id, vec![variant_item(ordered.id, 1)]),
    )
    .await?;

    let patch = UpdateProductRequest {
        name: Some("Renamed".into()),
        product_images: Some(Vec::new()),
        product_variants: Some(vec![upsert(Some(kept.id), "Tiny", 0)]),
        ..Default::default()
    };
    let err = catalog::apply_product_update(&app.state, product.id, patch)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    // nothing was applied
    assert_eq!(app.store.find_variant(kept.id).await?.unwrap().name, "Small");
    assert!(app.store.find_variant(ordered.id).await?.is_some());
    assert_eq!(app.images(product.id).await?[0].id, image.id);
    assert!(app.blobs.contains(&image.image_url));
    assert_eq!(
        app.store.find_product(product.id).await?.unwrap().name,
        "Roses"
    );
    Ok(())
}

#[tokio::test]
async fn failed_variant_delete_restores_updates_and_reports_stuck_insert() -> anyhow::Result<()> {
    let app = TestApp::new()?;
    let product = app.product("Roses").await?;
    let kept = app.variant(product.id, "Small").await?;
    let dropped = app.variant(product.id, "Large").await?;
    app.store.fail(StoreOp::DeleteVariants);

    let patch = UpdateProductRequest {
        product_variants: Some(vec![
            upsert(Some(kept.id), "Tiny", 0),
            upsert(None, "Huge", 1),
        ]),
        ..Default::default()
    };
    let err = catalog::apply_product_update(&app.state, product.id, patch)
        .await
        .unwrap_err();

    // the inserted variant cannot be removed while deletes fail
    assert!(matches!(err, AppError::CompensationFailed { .. }));
    app.store.heal(StoreOp::DeleteVariants);

    let restored = app.store.find_variant(kept.id).await?.unwrap();
    assert_eq!(restored.name, "Small");
    assert_eq!(restored.stock_quantity, kept.stock_quantity);
    assert!(app.store.find_variant(dropped.id).await?.is_some());
    assert_eq!(app.store.list_variants(product.id).await?.len(), 3);
    Ok(())
}

#[tokio::test]
async fn failed_variant_insert_restores_updates() -> anyhow::Result<()> {
    let app = TestApp::new()?;
    let product = app.product("Roses").await?;
    let kept = app.variant(product.id, "Small").await?;
    app.store.fail(StoreOp::InsertVariants);

    let patch = UpdateProductRequest {
        product_variants: Some(vec![
            upsert(Some(kept.id), "Tiny", 0),
            upsert(None, "Huge", 1),
        ]),
        ..Default::default()
    };
    let err = catalog::apply_product_update(&app.state, product.id, patch)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Store(_)));
    let restored = app.store.find_variant(kept.id).await?.unwrap();
    assert_eq!(restored, kept);
    assert_eq!(app.store.list_variants(product.id).await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn referenced_variant_cannot_be_deleted_until_order_is_gone() -> anyhow::Result<()> {
    let app = TestApp::new()?;
    let customer = app.customer().await?;
    let product = app.product("Roses").await?;
    let variant = app.variant(product.id, "Small").await?;
    let order = orders::create_order(
        &app.state,
        order_request(customer.id, vec![variant_item(variant.id, 2)]),
    )
    .await?;

    let err = catalog::delete_variant(&app.state, variant.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
    assert_eq!(app.store.find_variant(variant.id).await?, Some(variant.clone()));

    assert!(orders::delete_order(&app.state, order.order.id).await?);
    assert!(catalog::delete_variant(&app.state, variant.id).await?);
    assert!(!catalog::delete_variant(&app.state, variant.id).await?);
    Ok(())
}

#[tokio::test]
async fn deleting_images_promotes_then_leaves_none() -> anyhow::Result<()> {
    let app = TestApp::new()?;
    let product = app.product("Roses").await?;
    let a = app.upload(product.id, "a.png").await?;
    let b = app.upload(product.id, "b.png").await?;
    let c = app.upload(product.id, "c.png").await?;

    assert!(catalog::delete_image(&app.state, a.id).await?);
    assert_eq!(app.primary_ids(product.id).await?, vec![b.id]);
    assert!(!app.blobs.contains(&a.image_url));

    // removing a non-primary image leaves the primary alone
    assert!(catalog::delete_image(&app.state, c.id).await?);
    assert_eq!(app.primary_ids(product.id).await?, vec![b.id]);

    assert!(catalog::delete_image(&app.state, b.id).await?);
    assert!(app.images(product.id).await?.is_empty());
    assert!(!catalog::delete_image(&app.state, b.id).await?);
    Ok(())
}

#[tokio::test]
async fn blob_failure_keeps_image_row() -> anyhow::Result<()> {
    let app = TestApp::new()?;
    let product = app.product("Roses").await?;
    let image = app.upload(product.id, "a.png").await?;
    app.blobs.set_failing(true);

    let err = catalog::delete_image(&app.state, image.id).await.unwrap_err();
    assert!(matches!(err, AppError::Blob(_)));
    assert!(app.store.find_image(image.id).await?.is_some());
    Ok(())
}

#[tokio::test]
async fn failed_image_insert_removes_blob() -> anyhow::Result<()> {
    let app = TestApp::new()?;
    let product = app.product("Roses").await?;
    app.store.fail(StoreOp::InsertImage);

    let err = catalog::upload_image(&app.state, product.id, "a.png", vec![1, 2, 3])
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Store(_)));
    assert!(app.blobs.is_empty());
    assert!(app.images(product.id).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn concurrent_first_uploads_settle_on_one_primary() -> anyhow::Result<()> {
    let app = TestApp::interleaved()?;
    let product = app.product("Roses").await?;

    let (first, second) = tokio::join!(
        catalog::upload_image(&app.state, product.id, "a.png", vec![1]),
        catalog::upload_image(&app.state, product.id, "b.png", vec![2]),
    );
    let (first, second) = (first?, second?);

    let earliest = first.id.min(second.id);
    assert_eq!(app.primary_ids(product.id).await?, vec![earliest]);
    assert_eq!(app.images(product.id).await?.len(), 2);
    Ok(())
}

#[tokio::test]
async fn set_primary_repairs_double_primary() -> anyhow::Result<()> {
    let app = TestApp::new()?;
    let product = app.product("Roses").await?;
    let mut forced = Vec::new();
    for n in 0..2 {
        let image = app
            .store
            .insert_image(NewProductImage {
                product_id: product.id,
                image_url: format!("memory://blobs/forced-{n}.png"),
                is_primary: true,
            })
            .await?;
        forced.push(image);
    }
    assert_eq!(app.primary_ids(product.id).await?.len(), 2);

    let chosen = catalog::set_primary_image(&app.state, forced[1].id).await?;

    assert!(chosen.is_primary);
    assert_eq!(app.primary_ids(product.id).await?, vec![forced[1].id]);

    let err = catalog::set_primary_image(&app.state, 9999)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    Ok(())
}

#[tokio::test]
async fn product_lifecycle() -> anyhow::Result<()> {
    let app = TestApp::new()?;
    let created = catalog::create_product(
        &app.state,
        CreateProductRequest {
            name: "Orchid".into(),
            description: Some("Potted".into()),
            price: 5800,
            stock_quantity: Some(4),
            category_id: None,
        },
    )
    .await?;
    let id = created.product.id;
    let image = app.upload(id, "orchid.png").await?;
    let variant = catalog::create_variant(
        &app.state,
        id,
        CreateVariantRequest {
            name: "White".into(),
            stock_quantity: 2,
            image_url: None,
        },
    )
    .await?;
    let variant = catalog::upload_variant_image(&app.state, variant.id, "white.png", vec![7])
        .await?;
    let variant_image = variant.image_url.clone().unwrap();
    assert!(variant_image.contains(&format!("variants/{}/", variant.id)));

    let listed = catalog::list_products(&app.state).await?;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].primary_image.as_ref().map(|i| i.id), Some(image.id));

    assert!(catalog::delete_product(&app.state, id).await?);
    assert!(app.blobs.is_empty());
    assert!(app.store.find_variant(variant.id).await?.is_none());
    assert!(!catalog::delete_product(&app.state, id).await?);
    let err = catalog::get_product(&app.state, id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    Ok(())
}

#[tokio::test]
async fn order_placed_during_reconciliation_rolls_back_variant_step() -> anyhow::Result<()> {
    let app = TestApp::new()?;
    let customer = app.customer().await?;
    let product = app.product("Roses").await?;
    let kept = app.variant(product.id, "Small").await?;
    let dropped = app.variant(product.id, "Large").await?;

    // the order lands after the read-only checks passed, before the variant delete
    let store = app.store.clone();
    let (customer_id, dropped_id) = (customer.id, dropped.id);
    app.store.before_next(StoreOp::InsertVariants, move || async move {
        let order = store
            .insert_order(NewOrder {
                customer_id,
                shipping_method: ShippingMethod::PickUp,
                status: OrderStatus::Processing,
                comments: None,
                delivery_area_id: None,
                delivery_fee: None,
            })
            .await
            .unwrap();
        store
            .insert_order_items(vec![NewOrderItem {
                order_id: order.id,
                quantity: 1,
                target: LineItemTarget::Variant(dropped_id),
            }])
            .await
            .unwrap();
    });

    let patch = UpdateProductRequest {
        product_variants: Some(vec![
            upsert(Some(kept.id), "Tiny", 0),
            upsert(None, "Huge", 1),
        ]),
        ..Default::default()
    };
    let err = catalog::apply_product_update(&app.state, product.id, patch)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Conflict(_)), "got {err}");
    assert_eq!(app.store.find_variant(kept.id).await?, Some(kept.clone()));
    assert_eq!(app.store.find_variant(dropped.id).await?, Some(dropped.clone()));
    let names: Vec<String> = app
        .store
        .list_variants(product.id)
        .await?
        .into_iter()
        .map(|variant| variant.name)
        .collect();
    assert_eq!(names, vec!["Small", "Large"]);
    Ok(())
}

#[tokio::test]
async fn stuck_blob_mid_reconciliation_leaves_no_dangling_rows() -> anyhow::Result<()> {
    let app = TestApp::new()?;
    let product = app.product("Roses").await?;
    let a = app.upload(product.id, "a.png").await?;
    let b = app.upload(product.id, "b.png").await?;
    let c = app.upload(product.id, "c.png").await?;
    app.blobs.fail_removal(&b.image_url);

    let patch = UpdateProductRequest {
        product_images: Some(vec![keep(c.id)]),
        ..Default::default()
    };
    let err = catalog::apply_product_update(&app.state, product.id, patch)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Blob(_)));

    // a went completely, b is untouched, and every surviving row still has its blob
    let images = app.images(product.id).await?;
    let ids: Vec<i64> = images.iter().map(|image| image.id).collect();
    assert_eq!(ids, vec![b.id, c.id]);
    assert!(!app.blobs.contains(&a.image_url));
    assert!(images.iter().all(|image| app.blobs.contains(&image.image_url)));
    assert_eq!(app.primary_ids(product.id).await?, vec![b.id]);
    Ok(())
}

#[tokio::test]
async fn stuck_blob_during_product_delete_keeps_rows_consistent() -> anyhow::Result<()> {
    let app = TestApp::new()?;
    let product = app.product("Roses").await?;
    let a = app.upload(product.id, "a.png").await?;
    let b = app.upload(product.id, "b.png").await?;
    app.blobs.fail_removal(&b.image_url);

    let err = catalog::delete_product(&app.state, product.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Blob(_)));

    let images = app.images(product.id).await?;
    assert_eq!(images.len(), 1);
    assert_eq!(images[0].id, b.id);
    assert!(app.blobs.contains(&b.image_url));
    assert!(!app.blobs.contains(&a.image_url));
    assert_eq!(app.primary_ids(product.id).await?, vec![b.id]);
    assert!(app.store.find_product(product.id).await?.is_some());
    Ok(())
}

#[tokio::test]
async fn unknown_category_is_rejected_before_any_write() -> anyhow::Result<()> {
    let app = TestApp::new()?;
    let product = app.product("Roses").await?;

    let patch = UpdateProductRequest {
        name: Some("Renamed".into()),
        category_id: Some(Some(77_777)),
        ..Default::default()
    };
    let err = catalog::apply_product_update(&app.state, product.id, patch)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)), "got {err}");
    assert_eq!(app.store.find_product(product.id).await?, Some(product));

    let err = catalog::create_product(
        &app.state,
        CreateProductRequest {
            name: "Lilies".into(),
            description: None,
            price: 900,
            stock_quantity: None,
            category_id: Some(77_777),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    assert_eq!(app.store.list_products().await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn explicit_null_clears_description_and_category() -> anyhow::Result<()> {
    let app = TestApp::new()?;
    let category = app.store.insert_category("Bouquets".into()).await?;
    let created = catalog::create_product(
        &app.state,
        CreateProductRequest {
            name: "Tulips".into(),
            description: Some("Spring mix".into()),
            price: 1500,
            stock_quantity: Some(3),
            category_id: Some(category.id),
        },
    )
    .await?;
    assert_eq!(created.category.map(|c| c.id), Some(category.id));

    let patch: UpdateProductRequest =
        serde_json::from_str(r#"{"description":null,"category_id":null,"price":1200}"#)?;
    let detail = catalog::apply_product_update(&app.state, created.product.id, patch).await?;

    assert_eq!(detail.product.description, None);
    assert_eq!(detail.product.category_id, None);
    assert!(detail.category.is_none());
    assert_eq!(detail.product.price, 1200);
    Ok(())
}
