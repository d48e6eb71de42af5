//! Service specification model.
//!
//! # Data Flow
//! ```text
//! management API / local file (JSON)
//!     → sources::SpecificationSource (fetch)
//!     → model.rs (serde deserialization)
//!     → ServiceSpecification (immutable, one per generation cycle)
//!     → generator (translation into proxy resources)
//! ```

pub mod model;

pub use model::{
    Api, AuthProvider, AuthRequirement, AuthRule, Authentication, Control, CustomPattern, Http,
    HttpRule, Method, ServiceSpecification, SourceFile, SourceInfo, Syntax, DESCRIPTOR_FILE_TYPE,
};

/// Split a fully-qualified method selector into (service, method).
///
/// `endpoints.examples.bookstore.Bookstore.ListShelves` becomes
/// `("endpoints.examples.bookstore.Bookstore", "ListShelves")`.
pub fn split_selector(selector: &str) -> Option<(&str, &str)> {
    match selector.rsplit_once('.') {
        Some((service, method)) if !service.is_empty() && !method.is_empty() => {
            Some((service, method))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_selector() {
        assert_eq!(
            split_selector("endpoints.examples.bookstore.Bookstore.ListShelves"),
            Some(("endpoints.examples.bookstore.Bookstore", "ListShelves"))
        );
        assert_eq!(split_selector("NoDots"), None);
        assert_eq!(split_selector("Trailing."), None);
        assert_eq!(split_selector(".Leading"), None);
    }
}
