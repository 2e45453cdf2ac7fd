//! Macro for implementing Display and FromStr for unit-variant enums
//!
//! Used for the small outcome enums that show up in log fields and in
//! persisted status columns.
//!
//! # Example
//!
//! ```rust
//! use darceo_domain::impl_domain_enum_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum Phase {
//!     Idle,
//!     Running,
//! }
//!
//! impl_domain_enum_conversions!(Phase {
//!     Idle => "idle",
//!     Running => "running",
//! });
//!
//! assert_eq!(Phase::Running.to_string(), "running");
//! assert_eq!("IDLE".parse::<Phase>().unwrap(), Phase::Idle);
//! ```

/// Implements Display and FromStr traits for unit-variant enums
///
/// Parsing is case-insensitive; display always uses the mapped string.
#[macro_export]
macro_rules! impl_domain_enum_conversions {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(Self::$variant => f.write_str($str),)+
                }
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.to_lowercase().as_str() {
                    $($str => Ok(Self::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($enum_name), s)),
                }
            }
        }
    };
}
