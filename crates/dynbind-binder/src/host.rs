//! The binding surface a host language runtime talks to.
//!
//! A [`Binder`] owns the call-site cache and drives the whole conversion path: a host
//! allocates a [`SiteId`] per call expression with [`Binder::call_site`], then calls
//! [`Binder::convert`] every time the expression runs. Each conversion looks up a
//! cached rule for the value's runtime type, resolves and records one on a miss, and
//! executes it.
//!
//! # Example
//!
//! ```
//! use dynbind_binder::{Binder, ResultKind};
//! use dynbind_core::{Value, well_known};
//!
//! let binder = Binder::with_defaults();
//! let request = binder
//!     .request(well_known::OBJECT, well_known::INT64, ResultKind::ImplicitCast)
//!     .unwrap();
//! let site = binder.call_site(request);
//!
//! let widened = binder.convert(site, Value::Boxed(Value::Int32(7).into())).unwrap();
//! assert_eq!(widened, Value::Int64(7));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use dynbind_core::{
    BindingError, ConfigError, ConversionError, ConversionOperator, RegistrationError, TypeHash,
    TypeShape, Value,
};
use dynbind_registry::TypeRegistry;
use rustc_hash::FxBuildHasher;
use tracing::{debug, trace};

use crate::cache::{CallSiteCache, SiteId, SiteStats};
use crate::catalog::ConversionCatalog;
use crate::config::BinderConfig;
use crate::exec::{Interpreter, NestedConverter};
use crate::overload::{self, OverloadCandidate, OverloadMatch};
use crate::request::{ConversionRequest, ResultKind};
use crate::resolver::ConversionResolver;
use crate::rule::{NestedConversion, Rule};

/// Conversion binder: resolver, call-site cache and interpreter behind one handle.
///
/// `Binder` is `Sync`; any number of threads may convert through the same sites.
pub struct Binder {
    registry: Arc<TypeRegistry>,
    catalog: Arc<ConversionCatalog>,
    config: BinderConfig,
    cache: CallSiteCache,
    sites: DashMap<SiteId, ConversionRequest, FxBuildHasher>,
    next_site: AtomicU64,
}

impl Binder {
    /// Create a binder with its own catalog over `registry`.
    pub fn new(registry: Arc<TypeRegistry>, config: BinderConfig) -> Result<Self, ConfigError> {
        let catalog = Arc::new(ConversionCatalog::new(registry));
        Self::with_catalog(catalog, config)
    }

    /// Create a binder sharing an existing catalog.
    pub fn with_catalog(
        catalog: Arc<ConversionCatalog>,
        config: BinderConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::assemble(catalog, config))
    }

    /// A binder over the process-wide registry and catalog with default settings.
    pub fn with_defaults() -> Self {
        let config = BinderConfig::default();
        debug_assert!(config.validate().is_ok());
        Self::assemble(crate::global_catalog(), config)
    }

    /// Build a binder from a validated configuration.
    fn assemble(catalog: Arc<ConversionCatalog>, config: BinderConfig) -> Self {
        let cache = CallSiteCache::new(
            config.cache_capacity,
            config.promote_on_hit,
            catalog.version_handle(),
        );
        Self {
            registry: Arc::clone(catalog.registry()),
            catalog,
            config,
            cache,
            sites: DashMap::with_hasher(FxBuildHasher),
            next_site: AtomicU64::new(1),
        }
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    pub fn catalog(&self) -> &Arc<ConversionCatalog> {
        &self.catalog
    }

    pub fn config(&self) -> &BinderConfig {
        &self.config
    }

    pub fn cache(&self) -> &CallSiteCache {
        &self.cache
    }

    fn resolver(&self) -> ConversionResolver<'_> {
        ConversionResolver::new(&self.catalog, &self.config)
    }

    // ==========================================================================
    // Requests and Resolution
    // ==========================================================================

    /// Build a request from registered types.
    pub fn request(
        &self,
        static_type: TypeHash,
        target: TypeHash,
        kind: ResultKind,
    ) -> Result<ConversionRequest, BindingError> {
        Ok(ConversionRequest::new(
            self.registry.require(static_type)?,
            self.registry.require(target)?,
            kind,
        ))
    }

    /// Resolve `request` for the current value without touching any cache.
    pub fn resolve(
        &self,
        request: &ConversionRequest,
        value: &Value,
    ) -> Result<Rule, BindingError> {
        let runtime = self.registry.shape_of(value)?;
        Ok(self.resolver().resolve(request, &runtime))
    }

    /// True if a value of exactly `from` converts to `to` under `kind`.
    pub fn can_convert(&self, from: TypeHash, to: TypeHash, kind: ResultKind) -> bool {
        let (Some(from), Some(to)) = (self.registry.get(from), self.registry.get(to)) else {
            return false;
        };
        let request = ConversionRequest::new(Arc::clone(&from), to, kind);
        !self.resolver().resolve(&request, &from).is_error()
    }

    /// Choose the best overload for arguments of the given types.
    pub fn select_overload(
        &self,
        candidates: &[OverloadCandidate],
        arg_types: &[TypeHash],
    ) -> Result<OverloadMatch, BindingError> {
        let found =
            overload::select_overload(&self.resolver(), &self.registry, candidates, arg_types)?;
        trace!(
            name = %candidates[found.index].name,
            cost = found.total_cost,
            "overload selected"
        );
        Ok(found)
    }

    // ==========================================================================
    // Call Sites
    // ==========================================================================

    /// Allocate a call site bound to `request`.
    pub fn call_site(&self, request: ConversionRequest) -> SiteId {
        let site = SiteId(self.next_site.fetch_add(1, Ordering::Relaxed));
        trace!(site = %site, request = %request, "allocated call site");
        self.sites.insert(site, request);
        self.cache.open(site);
        site
    }

    /// Forget a call site and its cached rules.
    ///
    /// Later conversions at `site` fail with [`RegistrationError::UnknownSite`]. Returns
    /// false if the site was not allocated by this binder.
    pub fn release_site(&self, site: SiteId) -> bool {
        let known = self.sites.remove(&site).is_some();
        self.cache.remove(site);
        known
    }

    /// The request a site was allocated for.
    pub fn site_request(&self, site: SiteId) -> Option<ConversionRequest> {
        self.sites.get(&site).map(|entry| entry.value().clone())
    }

    /// Convert `value` at `site`.
    ///
    /// Failures of the cast kinds surface as [`ConversionError::NoConversion`]; the try
    /// kinds return the target's sentinel instead.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn convert(&self, site: SiteId, value: Value) -> Result<Value, BindingError> {
        let request = self
            .site_request(site)
            .ok_or(RegistrationError::UnknownSite(site.0))?;
        Ok(self.convert_at(site, &request, value)?)
    }

    fn convert_at(
        &self,
        site: SiteId,
        request: &ConversionRequest,
        value: Value,
    ) -> Result<Value, ConversionError> {
        let runtime = self.runtime_shape(&value)?;
        let rule = match self.cache.lookup(site, runtime.hash) {
            Some(rule) => rule,
            None => {
                let rule = Arc::new(self.resolver().resolve(request, &runtime));
                self.cache.record(site, Arc::clone(&rule));
                rule
            }
        };
        self.execute(&rule, value)
    }

    /// Run a rule's computation against `value`.
    pub fn execute(&self, rule: &Rule, value: Value) -> Result<Value, ConversionError> {
        Interpreter::new(&self.registry, self).execute(rule, value)
    }

    fn runtime_shape(&self, value: &Value) -> Result<Arc<TypeShape>, ConversionError> {
        self.registry.shape_of(value).map_err(|err| match err {
            RegistrationError::UnknownType(hash) => ConversionError::UnknownType(hash),
            other => ConversionError::InvalidCast(other.to_string()),
        })
    }

    /// Drop the rules cached at one site.
    pub fn invalidate_all(&self, site: SiteId) {
        self.cache.invalidate_all(site);
    }

    pub fn stats(&self, site: SiteId) -> SiteStats {
        self.cache.stats(site)
    }

    // ==========================================================================
    // Catalog
    // ==========================================================================

    /// Register a conversion operator for a type that already exists.
    ///
    /// Every rule cached before the call becomes stale.
    pub fn register_extension_operator(
        &self,
        operator: ConversionOperator,
    ) -> Result<u64, BindingError> {
        let version = self.catalog.register_extension(operator)?;
        debug!(version, "cached rules invalidated by catalog change");
        Ok(version)
    }
}

impl NestedConverter for Binder {
    fn convert_nested(
        &self,
        conversion: &NestedConversion,
        value: Value,
    ) -> Result<Value, ConversionError> {
        let source = self
            .registry
            .get(conversion.source)
            .ok_or(ConversionError::UnknownType(conversion.source))?;
        let target = self
            .registry
            .get(conversion.target)
            .ok_or(ConversionError::UnknownType(conversion.target))?;
        let mut request = ConversionRequest::new(source, target, conversion.kind);
        if conversion.returns_object {
            request = request.returning_object();
        }
        self.cache.open(conversion.site);
        self.convert_at(conversion.site, &request, value)
    }
}
