use serde::{Deserialize, Deserializer};

pub mod auth;
pub mod orders;
pub mod products;

/// For PATCH fields on nullable columns: an absent field stays `None`, an explicit
/// `null` becomes `Some(None)`. Pair with `#[serde(default)]`.
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
