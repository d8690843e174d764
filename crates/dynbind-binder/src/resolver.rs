//! The conversion cascade.
//!
//! [`ConversionResolver::resolve`] turns a [`ConversionRequest`] and the runtime shape
//! of the current value into a [`Rule`]. Stages run in a fixed order and the first
//! one that applies commits:
//!
//! 1. Conversion to `object` (box or pass through). Unguarded.
//! 2. Every conversion available from the *static* shape. Unguarded.
//! 3. The same conversions from the exact *runtime* shape, guarded on that type.
//! 4. Delegate synthesis for delegate targets.
//! 5. The error rule: raise for cast kinds, return the sentinel for try kinds.
//!
//! Stages 4 and 5 run after the runtime-type guard has been added, so their rules
//! stay guarded too.
//!
//! Stages 2 and 3 try, in order: assignability, `Extensible<T>` unwrapping,
//! user-defined operators, numeric widening, `Nullable<T>` construction, enumerable
//! adaptation, null to reference, and COM object to interface.

use dynbind_core::{NumericKind, TypeHash, TypeShape, Value, well_known};
use tracing::{debug, trace};

use crate::cache::SiteId;
use crate::catalog::{ConversionCatalog, OperatorSearch};
use crate::classify;
use crate::config::BinderConfig;
use crate::request::{ConversionRequest, ResultKind};
use crate::rule::{Computation, NestedConversion, Rule, RuleBuilder, Strategy};

/// Resolves conversion requests against a catalog.
///
/// Resolution is a pure function of the request, the runtime shape and the catalog
/// contents; it never fails. An inconvertible request produces the error rule.
pub struct ConversionResolver<'a> {
    catalog: &'a ConversionCatalog,
    config: &'a BinderConfig,
}

impl<'a> ConversionResolver<'a> {
    pub fn new(catalog: &'a ConversionCatalog, config: &'a BinderConfig) -> Self {
        Self { catalog, config }
    }

    /// Resolve a request for a value whose exact runtime type is `runtime`.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn resolve(&self, request: &ConversionRequest, runtime: &TypeShape) -> Rule {
        // Read the version first: a concurrent catalog change then makes this rule stale
        let version = self.catalog.version();
        let mut rule = RuleBuilder::new(request);
        let to = &*request.target;
        let known = &*request.static_shape;

        if self.try_convert_to_object(&mut rule, to, known) {
            return self.commit(rule, request, "to-object", version);
        }

        if self.try_all_conversions(&mut rule, request, known) {
            return self.commit(rule, request, "static", version);
        }

        rule.add_guard(runtime.hash);

        if self.try_all_conversions(&mut rule, request, runtime) {
            return self.commit(rule, request, "runtime", version);
        }

        if self.try_extra_conversions(&mut rule, to) {
            return self.commit(rule, request, "destination", version);
        }

        rule.set_error();
        let built = rule.build(version);
        debug!(
            request = %request,
            runtime_type = %runtime.name,
            "no conversion available"
        );
        built
    }

    fn commit(
        &self,
        rule: RuleBuilder,
        request: &ConversionRequest,
        stage: &'static str,
        version: u64,
    ) -> Rule {
        let built = rule.build(version);
        trace!(
            request = %request,
            stage,
            strategy = %built.strategy(),
            guarded = !built.guard().is_unconditional(),
            "conversion stage committed"
        );
        built
    }

    // ==========================================================================
    // Stages
    // ==========================================================================

    fn try_convert_to_object(
        &self,
        rule: &mut RuleBuilder,
        to: &TypeShape,
        known: &TypeShape,
    ) -> bool {
        if to.hash != well_known::OBJECT {
            return false;
        }
        let target = if known.is_value_type() {
            Computation::boxed(Computation::Input)
        } else {
            Computation::Input
        };
        rule.set_success(Strategy::ToObject, target);
        true
    }

    fn try_all_conversions(
        &self,
        rule: &mut RuleBuilder,
        request: &ConversionRequest,
        known: &TypeShape,
    ) -> bool {
        let to = &*request.target;
        self.try_assignable(rule, to, known)
            || self.try_extensible(rule, to, known)
            || self.try_user_defined(rule, to, known)
            || self.try_implicit_numeric(rule, to, known)
            || self.try_nullable(rule, request, known)
            || self.try_enumerable(rule, to, known)
            || self.try_null(rule, to, known)
            || self.try_com(rule, to, known)
    }

    fn try_extra_conversions(&self, rule: &mut RuleBuilder, to: &TypeShape) -> bool {
        if classify::is_delegate_like(to) {
            rule.set_success(
                Strategy::Delegate,
                Computation::make_delegate(Computation::Input, to.hash),
            );
            return true;
        }
        false
    }

    // ==========================================================================
    // Conversion attempts
    // ==========================================================================

    fn try_assignable(&self, rule: &mut RuleBuilder, to: &TypeShape, known: &TypeShape) -> bool {
        if !classify::is_assignable_to(known, to) {
            return false;
        }
        // Types that are both enumerable and enumerators convert by get-enumerator
        if to.hash == well_known::ENUMERATOR && classify::is_enumerable_like(known) {
            return false;
        }
        rule.set_success(
            Strategy::Assignable,
            Computation::convert(Computation::Input, to.hash),
        );
        true
    }

    fn try_extensible(&self, rule: &mut RuleBuilder, to: &TypeShape, known: &TypeShape) -> bool {
        let extensible = TypeHash::from_generic_instance(well_known::EXTENSIBLE, &[to.hash]);
        if !known.derives_from(extensible) {
            return false;
        }
        rule.set_success(
            Strategy::ExtensibleUnwrap,
            Computation::extensible_value(Computation::Input),
        );
        true
    }

    fn try_user_defined(&self, rule: &mut RuleBuilder, to: &TypeShape, known: &TypeShape) -> bool {
        let underlying = classify::unwrap_extensible(known)
            .and_then(|payload| self.catalog.registry().get(payload));
        let check = underlying.as_deref().unwrap_or(known);

        let order = OperatorSearch::preference_order(&to.name, rule.kind());
        let Some(found) = self.catalog.find_user_defined_conversion(check, to, &order) else {
            return false;
        };

        let arg = if underlying.is_some() {
            Computation::extensible_value(Computation::Input)
        } else {
            Computation::convert(Computation::Input, known.hash)
        };
        let mut target = Computation::call(found.operator, arg);
        if !found.implicit && rule.kind() == ResultKind::ExplicitTry {
            target = Computation::try_catch(target, rule.try_sentinel());
        }
        rule.set_success(Strategy::UserDefined, target);
        true
    }

    fn try_implicit_numeric(
        &self,
        rule: &mut RuleBuilder,
        to: &TypeShape,
        known: &TypeShape,
    ) -> bool {
        // Only a direct Extensible<T> is unwrapped here, not its subclasses
        let direct = classify::unwrap_direct_extensible(known);
        let from = match direct {
            Some(payload) => NumericKind::from_type_hash(payload),
            None => known.numeric,
        };
        let (Some(from), Some(to_kind)) = (from, to.numeric) else {
            return false;
        };
        if !classify::is_implicitly_widenable(from, to_kind) {
            return false;
        }
        let value = if direct.is_some() {
            Computation::extensible_value(Computation::Input)
        } else {
            Computation::Input
        };
        rule.set_success(
            Strategy::NumericWidening,
            Computation::convert(value, to.hash),
        );
        true
    }

    fn try_nullable(
        &self,
        rule: &mut RuleBuilder,
        request: &ConversionRequest,
        known: &TypeShape,
    ) -> bool {
        let Some(payload) = classify::unwrap_nullable(&request.target) else {
            return false;
        };

        if known.is_null() {
            rule.set_success(
                Strategy::Nullable,
                Computation::construct_nullable(payload, None),
            );
            return true;
        }

        if known.hash == payload {
            rule.set_success(
                Strategy::Nullable,
                Computation::construct_nullable(
                    payload,
                    Some(Computation::convert(Computation::Input, payload)),
                ),
            );
            return true;
        }

        if !request.kind.is_explicit() || known.hash == well_known::OBJECT {
            return false;
        }

        // Explicit casts also accept anything that converts to the payload type
        let nested = NestedConversion {
            site: SiteId::from(request.nested_site_hash(payload)),
            source: request.static_shape.hash,
            target: payload,
            kind: request.kind,
            returns_object: request.kind.is_try(),
        };

        let target = if request.kind == ResultKind::ExplicitCast {
            // A failing nested cast raises its own error unchanged
            Computation::construct_nullable(
                payload,
                Some(Computation::nested(nested, Computation::Input)),
            )
        } else {
            let tmp = rule.declare_temporary("tmp", well_known::OBJECT);
            Computation::if_not_null(
                Computation::assign(tmp, Computation::nested(nested, Computation::Input)),
                Computation::construct_nullable(
                    payload,
                    Some(Computation::convert(Computation::Temp(tmp), payload)),
                ),
                rule.try_sentinel(),
            )
        };
        rule.set_success(Strategy::Nullable, target);
        true
    }

    fn try_enumerable(&self, rule: &mut RuleBuilder, to: &TypeShape, known: &TypeShape) -> bool {
        if to.hash == well_known::ENUMERATOR {
            let adaptable = classify::is_enumerable_like(known)
                || (self.config.com_interop && classify::is_com_interop_object(known));
            if !adaptable {
                return false;
            }
        } else if to.is_interface()
            && let Some(item) = to.single_generic_arg(well_known::ENUMERATOR_OF)
        {
            if !classify::is_enumerable_of(known, item) {
                return false;
            }
        } else {
            return false;
        }
        rule.set_success(
            Strategy::Enumerable,
            Computation::get_enumerator(Computation::Input, to.hash),
        );
        true
    }

    fn try_null(&self, rule: &mut RuleBuilder, to: &TypeShape, known: &TypeShape) -> bool {
        if !known.is_null() || to.is_value_type() {
            return false;
        }
        rule.set_success(
            Strategy::NullToReference,
            Computation::Constant(Value::Null),
        );
        true
    }

    fn try_com(&self, rule: &mut RuleBuilder, to: &TypeShape, known: &TypeShape) -> bool {
        if !self.config.com_interop || !classify::is_com_interop_object(known) || !to.is_interface()
        {
            return false;
        }
        // The object answers the interface query at runtime
        rule.set_success(
            Strategy::ComInterface,
            Computation::convert(Computation::Input, to.hash),
        );
        true
    }
}
