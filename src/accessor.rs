//! Field accessor module for reportq
//!
//! A record layout lists the readable properties of a record type in order,
//! each with a factory that builds its read function. The accessor cache
//! builds those functions on first use and keeps them, indexed by property
//! position, for the lifetime of the cursor that owns the cache.
//!
//! The cache is single-owner and uses `RefCell` without any locking.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::value::{Value, ValueType};

/// Read function for one property of record type `R`
pub type FieldAccessor<R> = Rc<dyn Fn(&R) -> Value>;

type AccessorFactory<R> = Rc<dyn Fn() -> FieldAccessor<R>>;

/// One readable property of a record type
pub struct Property<R> {
    name: String,
    value_type: ValueType,
    nullable: bool,
    factory: AccessorFactory<R>,
}

impl<R> Property<R> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    /// Whether the property may read as NULL
    pub fn nullable(&self) -> bool {
        self.nullable
    }
}

impl<R> Clone for Property<R> {
    fn clone(&self) -> Self {
        Property {
            name: self.name.clone(),
            value_type: self.value_type,
            nullable: self.nullable,
            factory: Rc::clone(&self.factory),
        }
    }
}

impl<R> fmt::Debug for Property<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("name", &self.name)
            .field("value_type", &self.value_type)
            .field("nullable", &self.nullable)
            .finish()
    }
}

/// Ordered list of the readable properties of a record type
pub struct RecordLayout<R> {
    properties: Vec<Property<R>>,
    by_name: HashMap<String, usize>,
}

impl<R> Clone for RecordLayout<R> {
    fn clone(&self) -> Self {
        RecordLayout {
            properties: self.properties.clone(),
            by_name: self.by_name.clone(),
        }
    }
}

impl<R> fmt::Debug for RecordLayout<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.properties.iter()).finish()
    }
}

impl<R: 'static> Default for RecordLayout<R> {
    fn default() -> Self {
        RecordLayout::new()
    }
}

impl<R: 'static> RecordLayout<R> {
    pub fn new() -> Self {
        RecordLayout {
            properties: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    /// Append a property read by `reader`
    pub fn property<F>(self, name: &str, value_type: ValueType, nullable: bool, reader: F) -> Self
    where
        F: Fn(&R) -> Value + 'static,
    {
        let reader: FieldAccessor<R> = Rc::new(reader);
        self.property_with_factory(name, value_type, nullable, move || Rc::clone(&reader))
    }

    /// Append a property whose read function is built by `factory` on first use
    pub fn property_with_factory<F>(
        mut self,
        name: &str,
        value_type: ValueType,
        nullable: bool,
        factory: F,
    ) -> Self
    where
        F: Fn() -> FieldAccessor<R> + 'static,
    {
        self.by_name
            .insert(name.to_lowercase(), self.properties.len());
        self.properties.push(Property {
            name: name.to_string(),
            value_type,
            nullable,
            factory: Rc::new(factory),
        });
        self
    }
}

impl<R> RecordLayout<R> {
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn properties(&self) -> &[Property<R>] {
        &self.properties
    }

    pub fn get(&self, index: usize) -> Option<&Property<R>> {
        self.properties.get(index)
    }

    /// Find a property by name, case-insensitively
    ///
    /// A table-qualified name (`Orders.Amount`) falls back to its last
    /// segment when the qualified name itself is not a property.
    pub fn find(&self, name: &str) -> Option<usize> {
        let key = name.to_lowercase();
        if let Some(&index) = self.by_name.get(&key) {
            return Some(index);
        }
        key.rsplit_once('.')
            .and_then(|(_, column)| self.by_name.get(column).copied())
    }

    pub fn names(&self) -> Vec<String> {
        self.properties.iter().map(|p| p.name.clone()).collect()
    }
}

/// Record types with a fixed, statically known layout
pub trait Record: Sized + 'static {
    fn layout() -> RecordLayout<Self>;
}

/// Lazily populated accessors for one record layout
pub struct AccessorCache<R> {
    layout: Rc<RecordLayout<R>>,
    slots: RefCell<Vec<Option<FieldAccessor<R>>>>,
}

impl<R> AccessorCache<R> {
    pub fn new(layout: Rc<RecordLayout<R>>) -> Self {
        let slots = RefCell::new(vec![None; layout.len()]);
        AccessorCache { layout, slots }
    }

    pub fn layout(&self) -> &Rc<RecordLayout<R>> {
        &self.layout
    }

    /// Accessor for property `index`, built on first request
    ///
    /// # Returns
    /// * `Some(FieldAccessor)` for a valid index
    /// * `None` if the layout has no property at `index`
    pub fn accessor(&self, index: usize) -> Option<FieldAccessor<R>> {
        let mut slots = self.slots.borrow_mut();
        let slot = slots.get_mut(index)?;
        if let Some(accessor) = slot {
            return Some(Rc::clone(accessor));
        }
        let accessor = (self.layout.get(index)?.factory)();
        *slot = Some(Rc::clone(&accessor));
        Some(accessor)
    }

    /// Read property `index` of `record`
    pub fn read(&self, record: &R, index: usize) -> Option<Value> {
        self.accessor(index).map(|accessor| accessor(record))
    }

    /// Number of accessors built so far
    pub fn compiled_count(&self) -> usize {
        self.slots.borrow().iter().filter(|s| s.is_some()).count()
    }
}
