//! Named, mutable scalar parameters with an attached uniform generator.
//!
//! Priors, the likelihood, and the posterior all read and write the
//! *same* underlying parameter cells, so density evaluation is a read
//! of ambient state rather than a pure function of an argument vector.
//! The registry is deliberately single-threaded (`Rc<RefCell<..>>`);
//! parallel evaluation requires one registry clone per thread.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

struct Entry {
    name: String,
    value: f64,
}

struct Registry {
    entries: Vec<Entry>,
    index: HashMap<String, usize>,
    rng: StdRng,
}

/// Shared parameter registry.
///
/// Cloning the handle aliases the same registry; use [`Parameters::new`]
/// for an independent one.
#[derive(Clone)]
pub struct Parameters {
    inner: Rc<RefCell<Registry>>,
}

impl Parameters {
    /// Fresh empty registry with an OS-seeded generator.
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_os_rng())
    }

    /// Fresh empty registry with a deterministic generator.
    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Registry {
                entries: Vec::new(),
                index: HashMap::new(),
                rng,
            })),
        }
    }

    /// Get-or-insert a parameter by name. The initial value only
    /// applies when the name is new.
    pub fn declare(&self, name: &str, value: f64) -> Parameter {
        let mut registry = self.inner.borrow_mut();
        let idx = match registry.index.get(name) {
            Some(&idx) => idx,
            None => {
                let idx = registry.entries.len();
                registry.entries.push(Entry {
                    name: name.to_string(),
                    value,
                });
                registry.index.insert(name.to_string(), idx);
                idx
            }
        };
        drop(registry);
        Parameter {
            registry: Rc::clone(&self.inner),
            idx,
        }
    }

    /// Look up an existing parameter by name.
    pub fn get(&self, name: &str) -> Option<Parameter> {
        let idx = *self.inner.borrow().index.get(name)?;
        Some(Parameter {
            registry: Rc::clone(&self.inner),
            idx,
        })
    }

    /// Number of declared parameters.
    pub fn len(&self) -> usize {
        self.inner.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when two handles alias the same registry.
    pub fn same_registry(&self, other: &Parameters) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Draw a uniform variate in [0, 1) from the registry generator.
    pub fn random_unit(&self) -> f64 {
        self.inner.borrow_mut().rng.random::<f64>()
    }
}

impl Default for Parameters {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Parameters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registry = self.inner.borrow();
        f.debug_map()
            .entries(registry.entries.iter().map(|e| (&e.name, e.value)))
            .finish()
    }
}

/// Handle to one named scalar in a registry.
///
/// Clones alias the same cell.
#[derive(Clone)]
pub struct Parameter {
    registry: Rc<RefCell<Registry>>,
    idx: usize,
}

impl Parameter {
    pub fn name(&self) -> String {
        self.registry.borrow().entries[self.idx].name.clone()
    }

    /// Current value.
    pub fn evaluate(&self) -> f64 {
        self.registry.borrow().entries[self.idx].value
    }

    pub fn set(&self, value: f64) {
        self.registry.borrow_mut().entries[self.idx].value = value;
    }

    /// Uniform variate in [0, 1) from the registry generator attached
    /// to this parameter.
    pub fn evaluate_generator(&self) -> f64 {
        self.registry.borrow_mut().rng.random::<f64>()
    }
}

impl std::fmt::Debug for Parameter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Parameter")
            .field("name", &self.name())
            .field("value", &self.evaluate())
            .finish()
    }
}
