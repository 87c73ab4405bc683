//! Explicit loading state for aggregate relations.
//!
//! Nothing here fetches on access. Reading an unloaded relation returns
//! [`DomainError::NotLoaded`]; loading is done by the repository's initializers.

use crate::{DomainError, Result};

/// A to-one relation that is either just a foreign key or the loaded entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Relation<Id, T> {
    Unloaded(Id),
    Loaded(T),
}

impl<Id, T> Relation<Id, T> {
    pub fn is_loaded(&self) -> bool {
        matches!(self, Relation::Loaded(_))
    }

    /// Returns the loaded value, or `NotLoaded(name)`.
    pub fn get(&self, name: &'static str) -> Result<&T> {
        match self {
            Relation::Loaded(value) => Ok(value),
            Relation::Unloaded(_) => Err(DomainError::NotLoaded(name)),
        }
    }

    pub fn get_mut(&mut self, name: &'static str) -> Result<&mut T> {
        match self {
            Relation::Loaded(value) => Ok(value),
            Relation::Unloaded(_) => Err(DomainError::NotLoaded(name)),
        }
    }

    /// Replaces the relation with a loaded value.
    pub fn load(&mut self, value: T) {
        *self = Relation::Loaded(value);
    }
}

/// A to-many relation: either unloaded or the loaded, ordered elements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Collection<T> {
    Unloaded,
    Loaded(Vec<T>),
}

impl<T> Collection<T> {
    pub fn is_loaded(&self) -> bool {
        matches!(self, Collection::Loaded(_))
    }

    /// Returns the loaded elements, or `NotLoaded(name)`.
    pub fn get(&self, name: &'static str) -> Result<&[T]> {
        match self {
            Collection::Loaded(values) => Ok(values),
            Collection::Unloaded => Err(DomainError::NotLoaded(name)),
        }
    }

    pub fn get_mut(&mut self, name: &'static str) -> Result<&mut Vec<T>> {
        match self {
            Collection::Loaded(values) => Ok(values),
            Collection::Unloaded => Err(DomainError::NotLoaded(name)),
        }
    }

    pub fn load(&mut self, values: Vec<T>) {
        *self = Collection::Loaded(values);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unloaded_relation_reports_its_name() {
        let relation: Relation<i64, String> = Relation::Unloaded(7);
        assert!(!relation.is_loaded());
        assert!(matches!(
            relation.get("member"),
            Err(DomainError::NotLoaded("member"))
        ));
    }

    #[test]
    fn loading_replaces_the_key() {
        let mut relation: Relation<i64, String> = Relation::Unloaded(7);
        relation.load("Alice".to_string());
        assert_eq!(relation.get("member").unwrap(), "Alice");
    }

    #[test]
    fn collection_is_unloaded_until_loaded() {
        let mut lines: Collection<u32> = Collection::Unloaded;
        assert!(lines.get("order_items").is_err());

        lines.load(vec![1, 2]);
        lines.get_mut("order_items").unwrap().push(3);
        assert_eq!(lines.get("order_items").unwrap(), &[1, 2, 3]);
    }
}
