//! Cached object properties.
//!
//! Every cached field records where its value comes from: `Authoritative` values are written by
//! this crate's own calls and always trusted; `Queried` values are fetched from the API on first
//! access and kept until invalidated.
use std::cell::RefCell;

/// Where the value of a property comes from.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Origin {
    Authoritative,
    Queried,
}

/// A cached property value.
#[derive(Debug)]
pub struct Property<T> {
    origin: Origin,
    value: RefCell<Option<T>>,
}

impl<T: Clone> Property<T> {
    /// An unset property written by this crate.
    pub const fn authoritative() -> Property<T> {
        Property {
            origin: Origin::Authoritative,
            value: RefCell::new(None),
        }
    }

    /// An unset property fetched from the API on demand.
    pub const fn queried() -> Property<T> {
        Property {
            origin: Origin::Queried,
            value: RefCell::new(None),
        }
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    /// The cached value, if any. Never queries.
    pub fn get(&self) -> Option<T> {
        self.value.borrow().clone()
    }

    pub fn is_set(&self) -> bool {
        self.value.borrow().is_some()
    }

    pub fn set(&self, value: T) {
        self.value.replace(Some(value));
    }

    /// Returns the cached value, or runs `query` and caches its result.
    pub fn get_or_query<E>(&self, query: impl FnOnce() -> Result<T, E>) -> Result<T, E> {
        if let Some(value) = self.get() {
            return Ok(value);
        }
        let value = query()?;
        self.set(value.clone());
        Ok(value)
    }

    /// Forgets the cached value.
    pub fn invalidate(&self) {
        self.value.replace(None);
    }
}

/// A set of cached properties of one object.
pub trait CachedProperties {
    /// Identifies one property of the set.
    type Key: Copy;

    fn origin(&self, key: Self::Key) -> Origin;

    /// Forgets the cached value of a property. Queried properties are fetched again on next
    /// access; authoritative ones stay unset until this crate writes them again.
    fn invalidate(&self, key: Self::Key);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queried_once_until_invalidated() {
        let prop: Property<u32> = Property::queried();
        let mut queries = 0;
        let mut query = || -> Result<u32, ()> {
            queries += 1;
            Ok(42)
        };
        assert_eq!(prop.get_or_query(&mut query), Ok(42));
        assert_eq!(prop.get_or_query(&mut query), Ok(42));
        prop.invalidate();
        assert!(!prop.is_set());
        assert_eq!(prop.get_or_query(&mut query), Ok(42));
        assert_eq!(queries, 2);
    }

    #[test]
    fn failed_query_caches_nothing() {
        let prop: Property<u32> = Property::queried();
        assert_eq!(prop.get_or_query(|| Err("lost context")), Err("lost context"));
        assert_eq!(prop.get(), None);
    }

    #[test]
    fn authoritative_values() {
        let prop = Property::authoritative();
        assert_eq!(prop.origin(), Origin::Authoritative);
        assert_eq!(prop.get(), None);
        prop.set("rgba8");
        assert_eq!(prop.get(), Some("rgba8"));
    }
}
