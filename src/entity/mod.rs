pub mod categories;
pub mod customers;
pub mod delivery_areas;
pub mod delivery_credentials;
pub mod order_items;
pub mod orders;
pub mod product_images;
pub mod product_variants;
pub mod products;

pub use categories::Entity as Categories;
pub use customers::Entity as Customers;
pub use delivery_areas::Entity as DeliveryAreas;
pub use delivery_credentials::Entity as DeliveryCredentials;
pub use order_items::Entity as OrderItems;
pub use orders::Entity as Orders;
pub use product_images::Entity as ProductImages;
pub use product_variants::Entity as ProductVariants;
pub use products::Entity as Products;
