//! Catalog reconciliation: brings a product's images and variants to a desired set.
//!
//! Desired collections are matched to stored rows by id, never by position. Every
//! check that can reject a patch runs before the first write; the one check that can
//! race (variant still referenced by an order) is repeated right before the delete and
//! undone step-wise if it trips. Image changes applied before such a late conflict
//! are kept.

use std::collections::{HashMap, HashSet};

use crate::{
    blob::blob_key,
    dto::products::{
        CreateProductRequest, CreateVariantRequest, ImageSelection, ProductDetail,
        ProductSummary, UpdateProductRequest, UpdateVariantRequest, VariantUpsert,
    },
    error::{AppError, AppResult},
    models::{ProductImage, ProductVariant},
    services::saga::compensate,
    state::AppState,
    store::{NewProduct, NewProductImage, NewVariant, ProductChanges, Store, VariantChanges},
};

#[derive(Debug, Default, PartialEq)]
pub(crate) struct ImagePlan {
    pub to_delete: Vec<ProductImage>,
    pub explicit_primary: Option<i64>,
}

#[derive(Debug, Default)]
pub(crate) struct VariantPlan {
    /// Previous row and the changes to apply to it.
    pub updates: Vec<(ProductVariant, VariantChanges)>,
    pub inserts: Vec<NewVariant>,
    pub to_delete: Vec<i64>,
}

pub async fn apply_product_update(
    state: &AppState,
    product_id: i64,
    patch: UpdateProductRequest,
) -> AppResult<ProductDetail> {
    let store = state.store.as_ref();
    let UpdateProductRequest {
        name,
        description,
        price,
        stock_quantity,
        category_id,
        product_images,
        product_variants,
    } = patch;
    let changes = ProductChanges {
        name,
        description,
        price,
        stock_quantity,
        category_id,
    };
    validate_changes(&changes)?;

    store
        .find_product(product_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Product {product_id}")))?;
    if let Some(Some(category_id)) = changes.category_id {
        ensure_category(store, category_id).await?;
    }

    let image_plan = match product_images {
        Some(desired) => Some(plan_images(
            product_id,
            &store.list_images(product_id).await?,
            &desired,
        )?),
        None => None,
    };
    let variant_plan = match product_variants {
        Some(desired) => Some(plan_variants(
            product_id,
            store.list_variants(product_id).await?,
            desired,
        )?),
        None => None,
    };
    if let Some(plan) = &variant_plan {
        ensure_unreferenced(store, &plan.to_delete).await?;
    }

    if let Some(plan) = image_plan {
        apply_image_plan(state, product_id, plan).await?;
    }
    if let Some(plan) = variant_plan {
        apply_variant_plan(store, plan).await?;
    }
    if !changes.is_empty() {
        store
            .update_product(product_id, changes)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Product {product_id}")))?;
    }

    tracing::info!(product_id, "product updated");
    load_product_detail(store, product_id).await
}

/// Splits the current images into kept and deleted, and checks the desired list.
pub(crate) fn plan_images(
    product_id: i64,
    current: &[ProductImage],
    desired: &[ImageSelection],
) -> AppResult<ImagePlan> {
    let owned: HashSet<i64> = current.iter().map(|image| image.id).collect();
    if let Some(stray) = desired.iter().find(|sel| !owned.contains(&sel.id)) {
        return Err(AppError::Validation(format!(
            "image {} does not belong to product {product_id}",
            stray.id
        )));
    }

    let mut flagged: Vec<i64> = desired
        .iter()
        .filter(|sel| sel.is_primary)
        .map(|sel| sel.id)
        .collect();
    flagged.sort_unstable();
    flagged.dedup();
    if flagged.len() > 1 {
        return Err(AppError::Validation(
            "at most one image can be marked primary".into(),
        ));
    }

    let keep: HashSet<i64> = desired.iter().map(|sel| sel.id).collect();
    Ok(ImagePlan {
        to_delete: current
            .iter()
            .filter(|image| !keep.contains(&image.id))
            .cloned()
            .collect(),
        explicit_primary: flagged.first().copied(),
    })
}

pub(crate) fn plan_variants(
    product_id: i64,
    current: Vec<ProductVariant>,
    desired: Vec<VariantUpsert>,
) -> AppResult<VariantPlan> {
    let mut current: HashMap<i64, ProductVariant> =
        current.into_iter().map(|variant| (variant.id, variant)).collect();
    let mut plan = VariantPlan::default();
    let mut seen = HashSet::new();

    for upsert in desired {
        if upsert.name.trim().is_empty() {
            return Err(AppError::Validation("variant name must not be empty".into()));
        }
        if upsert.stock_quantity < 0 {
            return Err(AppError::Validation(
                "variant stock_quantity must not be negative".into(),
            ));
        }
        match upsert.id {
            Some(id) => {
                if !seen.insert(id) {
                    return Err(AppError::Validation(format!("variant {id} listed twice")));
                }
                let before = current.remove(&id).ok_or_else(|| {
                    AppError::Validation(format!(
                        "variant {id} does not belong to product {product_id}"
                    ))
                })?;
                let changes = VariantChanges {
                    name: Some(upsert.name),
                    stock_quantity: Some(upsert.stock_quantity),
                    image_url: upsert.image_url.map(Some),
                };
                plan.updates.push((before, changes));
            }
            None => plan.inserts.push(NewVariant {
                product_id,
                name: upsert.name,
                stock_quantity: upsert.stock_quantity,
                image_url: upsert.image_url,
            }),
        }
    }

    plan.to_delete = current.into_keys().collect();
    plan.to_delete.sort_unstable();
    Ok(plan)
}

/// Deletes image by image, blob before row, so a failure never leaves a row whose
/// blob is gone. If it stops halfway the primary is repaired before the error is
/// returned.
async fn apply_image_plan(state: &AppState, product_id: i64, plan: ImagePlan) -> AppResult<()> {
    let store = state.store.as_ref();
    for image in &plan.to_delete {
        if let Err(err) = remove_image(state, image).await {
            return Err(compensate(err, "image_delete", promote_earliest(store, product_id)).await);
        }
    }

    store.clear_primary(product_id, None).await?;
    let remaining = store.list_images(product_id).await?;
    let winner = plan
        .explicit_primary
        .filter(|id| remaining.iter().any(|image| image.id == *id))
        .or_else(|| remaining.first().map(|image| image.id));
    if let Some(image_id) = winner {
        store.mark_primary(image_id).await?;
    }
    tracing::debug!(
        product_id,
        deleted = plan.to_delete.len(),
        primary = ?winner,
        "images reconciled"
    );
    Ok(())
}

async fn remove_image(state: &AppState, image: &ProductImage) -> AppResult<()> {
    state.blobs.remove(&image.image_url).await?;
    state.store.delete_images(&[image.id]).await?;
    Ok(())
}

async fn ensure_category(store: &dyn Store, category_id: i64) -> AppResult<()> {
    store
        .find_category(category_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Category {category_id}")))?;
    Ok(())
}

async fn apply_variant_plan(store: &dyn Store, plan: VariantPlan) -> AppResult<()> {
    let mut updated: Vec<ProductVariant> = Vec::with_capacity(plan.updates.len());
    for (before, changes) in plan.updates {
        let failure = match store.update_variant(before.id, changes).await {
            Ok(Some(_)) => {
                updated.push(before);
                continue;
            }
            Ok(None) => AppError::not_found(format!("Variant {}", before.id)),
            Err(err) => err.into(),
        };
        return Err(compensate(failure, "variant_update", restore_variants(store, &updated, &[])).await);
    }

    let inserted: Vec<i64> = if plan.inserts.is_empty() {
        Vec::new()
    } else {
        match store.insert_variants(plan.inserts).await {
            Ok(rows) => rows.into_iter().map(|variant| variant.id).collect(),
            Err(err) => {
                return Err(compensate(
                    err.into(),
                    "variant_insert",
                    restore_variants(store, &updated, &[]),
                )
                .await);
            }
        }
    };

    if !plan.to_delete.is_empty() {
        // an order may have picked up one of these since the preflight
        let deleted = match ensure_unreferenced(store, &plan.to_delete).await {
            Ok(()) => store.delete_variants(&plan.to_delete).await.map_err(AppError::from),
            Err(err) => Err(err),
        };
        if let Err(err) = deleted {
            return Err(compensate(
                err,
                "variant_delete",
                restore_variants(store, &updated, &inserted),
            )
            .await);
        }
    }
    Ok(())
}

async fn restore_variants(
    store: &dyn Store,
    updated: &[ProductVariant],
    inserted: &[i64],
) -> AppResult<()> {
    for before in updated {
        store
            .update_variant(before.id, VariantChanges::restore(before))
            .await?;
    }
    if !inserted.is_empty() {
        store.delete_variants(inserted).await?;
    }
    Ok(())
}

/// Conflict if any order item still points at one of `variant_ids`.
async fn ensure_unreferenced(store: &dyn Store, variant_ids: &[i64]) -> AppResult<()> {
    if variant_ids.is_empty() {
        return Ok(());
    }
    let mut blocked: Vec<i64> = store
        .find_items_by_variants(variant_ids)
        .await?
        .iter()
        .filter_map(|item| item.target.variant_id())
        .collect();
    if blocked.is_empty() {
        return Ok(());
    }
    blocked.sort_unstable();
    blocked.dedup();
    Err(AppError::Conflict(format!(
        "variants {blocked:?} are referenced by existing orders"
    )))
}

fn validate_changes(changes: &ProductChanges) -> AppResult<()> {
    if changes.name.as_deref().is_some_and(|name| name.trim().is_empty()) {
        return Err(AppError::Validation("name must not be empty".into()));
    }
    if changes.price.is_some_and(|price| price < 0) {
        return Err(AppError::Validation("price must not be negative".into()));
    }
    if changes.stock_quantity.is_some_and(|stock| stock < 0) {
        return Err(AppError::Validation(
            "stock_quantity must not be negative".into(),
        ));
    }
    Ok(())
}

pub async fn upload_image(
    state: &AppState,
    product_id: i64,
    filename: &str,
    bytes: Vec<u8>,
) -> AppResult<ProductImage> {
    let store = state.store.as_ref();
    store
        .find_product(product_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Product {product_id}")))?;
    let has_primary = store
        .list_images(product_id)
        .await?
        .iter()
        .any(|image| image.is_primary);

    let url = state
        .blobs
        .put(&blob_key(&product_id.to_string(), filename), bytes)
        .await?;
    let new_image = NewProductImage {
        product_id,
        image_url: url.clone(),
        is_primary: !has_primary,
    };
    let image = match store.insert_image(new_image).await {
        Ok(image) => image,
        Err(err) => {
            return Err(compensate(err.into(), "image_insert", state.blobs.remove(&url)).await);
        }
    };

    if image.is_primary {
        settle_primary(store, product_id).await?;
    }
    tracing::info!(product_id, image_id = image.id, "image uploaded");
    Ok(store.find_image(image.id).await?.unwrap_or(image))
}

/// Keeps the earliest of several primaries. Two first uploads racing each other both
/// insert a primary row; whichever settles last still converges on the same winner.
async fn settle_primary(store: &dyn Store, product_id: i64) -> AppResult<()> {
    let images = store.list_images(product_id).await?;
    let mut primaries = images.iter().filter(|image| image.is_primary);
    if let (Some(winner), Some(_)) = (primaries.next(), primaries.next()) {
        tracing::warn!(product_id, keep = winner.id, "multiple primary images, settling");
        store.clear_primary(product_id, Some(winner.id)).await?;
    }
    Ok(())
}

/// Marks the earliest image primary unless the product already has one.
async fn promote_earliest(store: &dyn Store, product_id: i64) -> AppResult<()> {
    let images = store.list_images(product_id).await?;
    if images.iter().any(|image| image.is_primary) {
        return Ok(());
    }
    if let Some(first) = images.first() {
        store.mark_primary(first.id).await?;
        tracing::debug!(product_id, image_id = first.id, "promoted primary image");
    }
    Ok(())
}

pub async fn delete_image(state: &AppState, image_id: i64) -> AppResult<bool> {
    let store = state.store.as_ref();
    let Some(image) = store.find_image(image_id).await? else {
        return Ok(false);
    };
    state.blobs.remove(&image.image_url).await?;
    let deleted = store.delete_images(&[image_id]).await? > 0;
    if deleted && image.is_primary {
        promote_earliest(store, image.product_id).await?;
    }
    Ok(deleted)
}

pub async fn set_primary_image(state: &AppState, image_id: i64) -> AppResult<ProductImage> {
    let store = state.store.as_ref();
    let image = store
        .find_image(image_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Image {image_id}")))?;
    store.clear_primary(image.product_id, None).await?;
    match store.mark_primary(image_id).await? {
        Some(image) => Ok(image),
        None => {
            // deleted in between: do not leave the product without a primary
            promote_earliest(store, image.product_id).await?;
            Err(AppError::not_found(format!("Image {image_id}")))
        }
    }
}

pub async fn create_product(
    state: &AppState,
    payload: CreateProductRequest,
) -> AppResult<ProductDetail> {
    let store = state.store.as_ref();
    validate_changes(&ProductChanges {
        name: Some(payload.name.clone()),
        price: Some(payload.price),
        stock_quantity: payload.stock_quantity,
        ..Default::default()
    })?;
    if let Some(category_id) = payload.category_id {
        ensure_category(store, category_id).await?;
    }
    let product = store
        .insert_product(NewProduct {
            name: payload.name,
            description: payload.description,
            price: payload.price,
            stock_quantity: payload.stock_quantity,
            category_id: payload.category_id,
        })
        .await?;
    tracing::info!(product_id = product.id, "product created");
    load_product_detail(store, product.id).await
}

pub async fn get_product(state: &AppState, product_id: i64) -> AppResult<ProductDetail> {
    load_product_detail(state.store.as_ref(), product_id).await
}

pub async fn list_products(state: &AppState) -> AppResult<Vec<ProductSummary>> {
    let store = state.store.as_ref();
    let products = store.list_products().await?;
    let ids: Vec<i64> = products.iter().map(|product| product.id).collect();
    let mut primaries: HashMap<i64, ProductImage> = store
        .list_primary_images(&ids)
        .await?
        .into_iter()
        .map(|image| (image.product_id, image))
        .collect();
    Ok(products
        .into_iter()
        .map(|product| ProductSummary {
            primary_image: primaries.remove(&product.id),
            product,
        })
        .collect())
}

/// Removes the product with its images and variants. Refused while any order
/// references the product or one of its variants.
pub async fn delete_product(state: &AppState, product_id: i64) -> AppResult<bool> {
    let store = state.store.as_ref();
    if store.find_product(product_id).await?.is_none() {
        return Ok(false);
    }
    let variants = store.list_variants(product_id).await?;
    let variant_ids: Vec<i64> = variants.iter().map(|variant| variant.id).collect();
    ensure_unreferenced(store, &variant_ids).await?;
    if !store.find_items_by_product(product_id).await?.is_empty() {
        return Err(AppError::Conflict(format!(
            "product {product_id} is referenced by existing orders"
        )));
    }

    // each blob goes right before its row
    for image in store.list_images(product_id).await? {
        if let Err(err) = remove_image(state, &image).await {
            return Err(compensate(err, "image_delete", promote_earliest(store, product_id)).await);
        }
    }
    let (with_image, plain): (Vec<_>, Vec<_>) = variants
        .into_iter()
        .partition(|variant| variant.image_url.is_some());
    for variant in with_image {
        if let Some(url) = &variant.image_url {
            state.blobs.remove(url).await?;
        }
        store.delete_variants(&[variant.id]).await?;
    }
    let plain_ids: Vec<i64> = plain.iter().map(|variant| variant.id).collect();
    if !plain_ids.is_empty() {
        store.delete_variants(&plain_ids).await?;
    }
    let deleted = store.delete_product(product_id).await?;
    tracing::info!(product_id, deleted, "product deleted");
    Ok(deleted)
}

pub async fn create_variant(
    state: &AppState,
    product_id: i64,
    payload: CreateVariantRequest,
) -> AppResult<ProductVariant> {
    let store = state.store.as_ref();
    store
        .find_product(product_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Product {product_id}")))?;
    let plan = plan_variants(
        product_id,
        Vec::new(),
        vec![VariantUpsert {
            id: None,
            name: payload.name,
            stock_quantity: payload.stock_quantity,
            image_url: payload.image_url,
        }],
    )?;
    store
        .insert_variants(plan.inserts)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("variant insert returned no row")))
}

pub async fn update_variant(
    state: &AppState,
    variant_id: i64,
    payload: UpdateVariantRequest,
) -> AppResult<ProductVariant> {
    if payload.name.as_deref().is_some_and(|name| name.trim().is_empty()) {
        return Err(AppError::Validation("variant name must not be empty".into()));
    }
    if payload.stock_quantity.is_some_and(|stock| stock < 0) {
        return Err(AppError::Validation(
            "variant stock_quantity must not be negative".into(),
        ));
    }
    let changes = VariantChanges {
        name: payload.name,
        stock_quantity: payload.stock_quantity,
        image_url: None,
    };
    state
        .store
        .update_variant(variant_id, changes)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Variant {variant_id}")))
}

pub async fn delete_variant(state: &AppState, variant_id: i64) -> AppResult<bool> {
    let store = state.store.as_ref();
    if store.find_variant(variant_id).await?.is_none() {
        return Ok(false);
    }
    ensure_unreferenced(store, &[variant_id]).await?;
    Ok(store.delete_variants(&[variant_id]).await? > 0)
}

pub async fn upload_variant_image(
    state: &AppState,
    variant_id: i64,
    filename: &str,
    bytes: Vec<u8>,
) -> AppResult<ProductVariant> {
    let store = state.store.as_ref();
    let previous = store
        .find_variant(variant_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Variant {variant_id}")))?;

    let url = state
        .blobs
        .put(&blob_key(&format!("variants/{variant_id}"), filename), bytes)
        .await?;
    let changes = VariantChanges {
        image_url: Some(Some(url.clone())),
        ..Default::default()
    };
    let failure = match store.update_variant(variant_id, changes).await {
        Ok(Some(variant)) => {
            if let Some(old) = previous.image_url.filter(|old| *old != url) {
                if let Err(err) = state.blobs.remove(&old).await {
                    tracing::warn!(variant_id, error = %err, "failed to remove replaced variant image");
                }
            }
            return Ok(variant);
        }
        Ok(None) => AppError::not_found(format!("Variant {variant_id}")),
        Err(err) => err.into(),
    };
    Err(compensate(failure, "variant_image_update", state.blobs.remove(&url)).await)
}

async fn load_product_detail(store: &dyn Store, product_id: i64) -> AppResult<ProductDetail> {
    let product = store
        .find_product(product_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Product {product_id}")))?;
    let category = match product.category_id {
        Some(category_id) => store.find_category(category_id).await?,
        None => None,
    };
    Ok(ProductDetail {
        category,
        product_images: store.list_images(product_id).await?,
        product_variants: store.list_variants(product_id).await?,
        product,
    })
}
