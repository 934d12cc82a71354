pub mod activity;
pub mod itinerario;
pub mod rating;
pub mod roteiro;
pub mod social;

use serde::{Deserialize, Deserializer};

/// Reads a nullable column into a type with a sensible default.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
