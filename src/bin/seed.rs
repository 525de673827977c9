use anyhow::Context;
use storefront_api::{
    db::{create_orm_conn, run_migrations},
    services::auth::hash_password,
    store::{
        CatalogRepo, CredentialRepo, NewProduct, NewProductImage, NewVariant, OrmStore,
        ReferenceRepo,
    },
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
    let delivery_password =
        std::env::var("SEED_DELIVERY_PASSWORD").unwrap_or_else(|_| "delivery123".to_string());

    let conn = create_orm_conn(&database_url).await?;
    // Ensure migrations are applied.
    run_migrations(&conn).await?;
    let store = OrmStore::new(conn);

    if store.delivery_credential().await?.is_none() {
        let hash = hash_password(&delivery_password).map_err(|e| anyhow::anyhow!(e.to_string()))?;
        store.save_delivery_credential(hash).await?;
        println!("Delivery password set");
    }

    if !store.list_products().await?.is_empty() {
        println!("Catalog already seeded, skipping");
        return Ok(());
    }

    let category = store.insert_category("Bouquets".to_string()).await?;
    let customer = store
        .insert_customer(
            "Walk-in Customer".to_string(),
            Some("+10000000000".to_string()),
            None,
        )
        .await?;
    let area = store
        .insert_delivery_area("City Center".to_string(), 1500)
        .await?;
    seed_products(&store, category.id).await?;

    println!(
        "Seed completed. Category ID: {}, Customer ID: {}, Delivery area ID: {}",
        category.id, customer.id, area.id
    );
    Ok(())
}

async fn seed_products(store: &OrmStore, category_id: i64) -> anyhow::Result<()> {
    let samples = [
        ("Red Roses", "A dozen long-stem roses", 4500, &["Small", "Large"][..]),
        ("Spring Tulips", "Mixed seasonal tulips", 3200, &[][..]),
        ("Orchid Pot", "White phalaenopsis in a ceramic pot", 5800, &["White", "Pink"][..]),
    ];

    for (name, description, price, variants) in samples {
        let product = store
            .insert_product(NewProduct {
                name: name.to_string(),
                description: Some(description.to_string()),
                price,
                stock_quantity: Some(10),
                category_id: Some(category_id),
            })
            .await?;
        store
            .insert_image(NewProductImage {
                product_id: product.id,
                image_url: format!("https://picsum.photos/seed/{}/600/600", product.id),
                is_primary: true,
            })
            .await?;
        let rows = variants
            .iter()
            .map(|variant| NewVariant {
                product_id: product.id,
                name: variant.to_string(),
                stock_quantity: 5,
                image_url: None,
            })
            .collect::<Vec<_>>();
        if !rows.is_empty() {
            store.insert_variants(rows).await?;
        }
    }
    Ok(())
}
