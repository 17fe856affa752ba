//! Particle filter definitions and the process-wide filter registry.
//!
//! A particle filter binds a name to a boolean predicate over the particles
//! of a base type. Filters are registered once, process-wide, and live for
//! the life of the process; attaching one to a dataset creates a filtered
//! particle type whose fields read through to the base type with the mask
//! applied (see [`crate::dataset::Dataset::add_particle_filter`]).
//!
//! Registering under a name that is already taken replaces the old filter,
//! emits a warning, and hands the replaced filter back to the caller.

use std::fmt;
use std::sync::{Arc, OnceLock, RwLock};

use fnv::FnvHashMap;
use regex::Regex;
use tracing::warn;

use crate::error::{CribaError, Result};
use crate::fields::FieldKey;
use crate::selection::ParticleSource;

/// Boolean mask over the particles of a filter's base type.
pub type FilterMask = Vec<bool>;

/// Predicate evaluated against a data selection. Receives the filter itself
/// so one function can serve several registered names.
pub type FilterFn =
    Arc<dyn Fn(&ParticleFilter, &dyn ParticleSource) -> Result<FilterMask> + Send + Sync>;

/// Base type used when a filter does not name one.
pub const DEFAULT_FILTERED_TYPE: &str = "all";

/// A named predicate selecting a subset of one particle type.
#[derive(Clone)]
pub struct ParticleFilter {
    name: String,
    filtered_type: String,
    requires: Vec<String>,
    function: FilterFn,
}

impl fmt::Debug for ParticleFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParticleFilter")
            .field("name", &self.name)
            .field("filtered_type", &self.filtered_type)
            .field("requires", &self.requires)
            .finish_non_exhaustive()
    }
}

impl ParticleFilter {
    /// Create a filter without registering it. The name must be an
    /// identifier: leading letter or underscore, then letters, digits,
    /// underscores.
    pub fn new<F>(name: &str, function: F, requires: &[&str], filtered_type: &str) -> Result<Self>
    where
        F: Fn(&ParticleFilter, &dyn ParticleSource) -> Result<FilterMask> + Send + Sync + 'static,
    {
        validate_filter_name(name)?;
        Ok(Self {
            name: name.to_string(),
            filtered_type: filtered_type.to_string(),
            requires: requires.iter().map(|r| (*r).to_string()).collect(),
            function: Arc::new(function),
        })
    }

    /// Start building a filter with the default base type (`"all"`) and no
    /// required fields.
    pub fn builder(name: &str) -> ParticleFilterBuilder {
        ParticleFilterBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The particle type the filter selects from.
    pub fn filtered_type(&self) -> &str {
        &self.filtered_type
    }

    /// Field names the predicate needs, all under [`Self::filtered_type`].
    pub fn requires(&self) -> &[String] {
        &self.requires
    }

    /// The registered predicate. Useful for checking which function a name
    /// currently resolves to after an override.
    pub fn function(&self) -> &FilterFn {
        &self.function
    }

    /// True when every required field is present in `field_list` under the
    /// filter's base type.
    pub fn available(&self, field_list: &[FieldKey]) -> bool {
        self.requires
            .iter()
            .all(|name| has_field(field_list, &self.filtered_type, name))
    }

    /// Required fields absent from `field_list`, in `requires` order.
    pub fn missing(&self, field_list: &[FieldKey]) -> Vec<FieldKey> {
        self.requires
            .iter()
            .filter(|name| !has_field(field_list, &self.filtered_type, name))
            .map(|name| FieldKey::new(&self.filtered_type, name))
            .collect()
    }

    /// Evaluate the predicate against `data`, which serves fields of the
    /// filter's base type.
    pub fn mask(&self, data: &dyn ParticleSource) -> Result<FilterMask> {
        (self.function)(self, data)
    }

    /// Whether two handles share one registered predicate.
    pub fn same_function(&self, other: &ParticleFilter) -> bool {
        Arc::ptr_eq(&self.function, &other.function)
    }
}

/// Builder for [`ParticleFilter`], ending in [`build`](Self::build) for a
/// standalone filter or [`register`](Self::register) to publish it.
#[derive(Debug, Clone)]
pub struct ParticleFilterBuilder {
    name: String,
    filtered_type: String,
    requires: Vec<String>,
}

impl ParticleFilterBuilder {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            filtered_type: DEFAULT_FILTERED_TYPE.to_string(),
            requires: Vec::new(),
        }
    }

    pub fn filtered_type(mut self, ptype: &str) -> Self {
        self.filtered_type = ptype.to_string();
        self
    }

    pub fn requires<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.requires = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Finish the filter without registering it.
    pub fn build<F>(self, function: F) -> Result<ParticleFilter>
    where
        F: Fn(&ParticleFilter, &dyn ParticleSource) -> Result<FilterMask> + Send + Sync + 'static,
    {
        validate_filter_name(&self.name)?;
        Ok(ParticleFilter {
            name: self.name,
            filtered_type: self.filtered_type,
            requires: self.requires,
            function: Arc::new(function),
        })
    }

    /// Finish the filter and publish it in the process-wide registry,
    /// returning any filter the name previously resolved to.
    pub fn register<F>(self, function: F) -> Result<Option<ParticleFilter>>
    where
        F: Fn(&ParticleFilter, &dyn ParticleSource) -> Result<FilterMask> + Send + Sync + 'static,
    {
        Ok(register_filter(self.build(function)?))
    }
}

fn has_field(field_list: &[FieldKey], ftype: &str, name: &str) -> bool {
    field_list
        .iter()
        .any(|key| key.ftype == ftype && key.name == name)
}

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("hard-coded pattern compiles")
    })
}

/// Whether `name` is acceptable as a filter name. Filter names double as
/// field types, so they follow identifier rules.
pub fn is_valid_filter_name(name: &str) -> bool {
    name_pattern().is_match(name)
}

fn validate_filter_name(name: &str) -> Result<()> {
    if is_valid_filter_name(name) {
        Ok(())
    } else {
        Err(CribaError::InvalidFilterName {
            name: name.to_string(),
        })
    }
}

type RegistryMap = FnvHashMap<String, ParticleFilter>;

static FILTER_REGISTRY: OnceLock<RwLock<RegistryMap>> = OnceLock::new();

fn registry() -> &'static RwLock<RegistryMap> {
    FILTER_REGISTRY.get_or_init(|| RwLock::new(FnvHashMap::default()))
}

fn read_registry() -> std::sync::RwLockReadGuard<'static, RegistryMap> {
    registry().read().unwrap_or_else(|e| e.into_inner())
}

fn write_registry() -> std::sync::RwLockWriteGuard<'static, RegistryMap> {
    registry().write().unwrap_or_else(|e| e.into_inner())
}

/// Create a filter and publish it in the process-wide registry.
///
/// Returns the filter the name previously resolved to, if any; a replacement
/// is also logged at warn level. Registered filters are never removed.
///
/// ```
/// use criba::filters::{self, FilterMask};
///
/// filters::add_particle_filter(
///     "doc_heavy",
///     |filter, data| {
///         let mass = data.field(&(filter.filtered_type(), "particle_mass").into())?;
///         Ok(mass.as_slice().iter().map(|&m| m > 0.5).collect::<FilterMask>())
///     },
///     &["particle_mass"],
///     "all",
/// )
/// .unwrap();
///
/// assert!(filters::filter_exists("doc_heavy"));
/// ```
pub fn add_particle_filter<F>(
    name: &str,
    function: F,
    requires: &[&str],
    filtered_type: &str,
) -> Result<Option<ParticleFilter>>
where
    F: Fn(&ParticleFilter, &dyn ParticleSource) -> Result<FilterMask> + Send + Sync + 'static,
{
    let filter = ParticleFilter::new(name, function, requires, filtered_type)?;
    Ok(register_filter(filter))
}

/// Publish an already-built filter, replacing and returning any existing
/// entry under the same name.
pub fn register_filter(filter: ParticleFilter) -> Option<ParticleFilter> {
    let name = filter.name().to_string();
    let previous = write_registry().insert(name.clone(), filter);
    if previous.is_some() {
        warn!(filter = %name, "particle filter already registered, overriding");
    }
    previous
}

/// Look up a registered filter by name.
pub fn get_filter(name: &str) -> Option<ParticleFilter> {
    read_registry().get(name).cloned()
}

pub fn filter_exists(name: &str) -> bool {
    read_registry().contains_key(name)
}

/// Names of all registered filters, sorted.
pub fn registered_filter_names() -> Vec<String> {
    let mut names: Vec<String> = read_registry().keys().cloned().collect();
    names.sort();
    names
}
