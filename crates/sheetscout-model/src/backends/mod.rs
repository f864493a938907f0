#[cfg(feature = "calamine")]
mod calamine;
#[cfg(feature = "json")]
mod json;
#[cfg(feature = "calamine")]
mod package;

#[cfg(feature = "calamine")]
pub use calamine::CalamineReader;
#[cfg(feature = "json")]
pub use json::JsonReader;
