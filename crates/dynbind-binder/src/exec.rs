//! Interpreter back end for the computation IR.
//!
//! [`Interpreter::execute`] evaluates a [`Rule`]'s target against one input value.
//! Nested dynamic conversions are handed to a [`NestedConverter`], which the binder
//! implements by routing them through their own call sites.

use std::sync::Arc;

use dynbind_core::{
    ConversionError, DelegateValue, EnumeratorValue, TypeHash, Value, well_known,
};
use dynbind_registry::TypeRegistry;

use crate::rule::{Computation, NestedConversion, Rule, TempId};

/// Performs the nested conversions a computation requests.
pub trait NestedConverter {
    fn convert_nested(
        &self,
        conversion: &NestedConversion,
        value: Value,
    ) -> Result<Value, ConversionError>;
}

/// A converter for computations that never nest; every request fails.
pub struct NoNesting;

impl NestedConverter for NoNesting {
    fn convert_nested(
        &self,
        conversion: &NestedConversion,
        value: Value,
    ) -> Result<Value, ConversionError> {
        Err(ConversionError::InvalidCast(format!(
            "nested conversion of {} to {} is not available",
            value.type_hash(),
            conversion.target
        )))
    }
}

/// Evaluation state for one execution.
struct Frame {
    input: Value,
    temps: Vec<Value>,
}

impl Frame {
    fn temp(&self, id: TempId) -> Value {
        self.temps
            .get(id.0 as usize)
            .cloned()
            .unwrap_or(Value::Null)
    }

    fn store(&mut self, id: TempId, value: Value) {
        let index = id.0 as usize;
        if index >= self.temps.len() {
            self.temps.resize(index + 1, Value::Null);
        }
        self.temps[index] = value;
    }
}

/// Tree-walking evaluator for [`Computation`]s.
pub struct Interpreter<'a> {
    registry: &'a TypeRegistry,
    nested: &'a dyn NestedConverter,
}

impl<'a> Interpreter<'a> {
    pub fn new(registry: &'a TypeRegistry, nested: &'a dyn NestedConverter) -> Self {
        Self { registry, nested }
    }

    /// Run `rule` against `input`.
    ///
    /// The caller is responsible for checking the rule's guard first.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn execute(&self, rule: &Rule, input: Value) -> Result<Value, ConversionError> {
        let mut frame = Frame {
            input,
            temps: vec![Value::Null; rule.temporaries().len()],
        };
        self.eval(rule.target(), &mut frame)
    }

    fn eval(&self, computation: &Computation, frame: &mut Frame) -> Result<Value, ConversionError> {
        match computation {
            Computation::Input => Ok(frame.input.clone()),
            Computation::Temp(id) => Ok(frame.temp(*id)),
            Computation::Constant(value) => Ok(value.clone()),
            Computation::Box(value) => {
                let value = self.eval(value, frame)?;
                Ok(self.box_value(value))
            }
            Computation::Convert { value, to } => {
                let value = self.eval(value, frame)?;
                self.convert_value(value, *to)
            }
            Computation::ExtensibleValue(value) => {
                let value = self.eval(value, frame)?;
                match value.unboxed() {
                    Value::Extensible(ext) => Ok(ext.value.clone()),
                    other => Err(ConversionError::InvalidCast(format!(
                        "expected an extensible value, found {}",
                        self.registry.name_of(other.type_hash())
                    ))),
                }
            }
            Computation::Call { operator, arg } => {
                let arg = self.eval(arg, frame)?;
                operator.invoke(arg)
            }
            Computation::ConstructNullable { payload, value } => match value {
                Some(value) => {
                    let value = self.eval(value, frame)?;
                    Ok(Value::nullable(*payload, value.unboxed().clone()))
                }
                None => Ok(Value::empty_nullable(*payload)),
            },
            Computation::GetEnumerator { value, enumerator } => {
                let value = self.eval(value, frame)?;
                self.get_enumerator(value, *enumerator)
            }
            Computation::MakeDelegate {
                value,
                delegate_type,
            } => {
                let target = self.eval(value, frame)?;
                Ok(Value::Delegate(Arc::new(DelegateValue {
                    delegate_type: *delegate_type,
                    target,
                })))
            }
            Computation::Nested { conversion, value } => {
                let value = self.eval(value, frame)?;
                self.nested.convert_nested(conversion, value)
            }
            Computation::Assign { temp, value } => {
                let value = self.eval(value, frame)?;
                frame.store(*temp, value.clone());
                Ok(value)
            }
            Computation::IfNotNull {
                test,
                then,
                otherwise,
            } => {
                if self.eval(test, frame)?.is_null() {
                    self.eval(otherwise, frame)
                } else {
                    self.eval(then, frame)
                }
            }
            Computation::ReturnSentinel(ty) => Ok(self.sentinel(*ty)),
            Computation::ThrowError { value, to } => {
                let value = self.eval(value, frame)?;
                let from = value.type_hash();
                Err(ConversionError::no_conversion(
                    from,
                    self.registry.name_of(from),
                    *to,
                    self.registry.name_of(*to),
                ))
            }
            Computation::TryCatch { body, fallback } => match self.eval(body, frame) {
                Ok(value) => Ok(value),
                Err(_) => self.eval(fallback, frame),
            },
        }
    }

    /// The value a failed try conversion to `ty` yields.
    pub fn sentinel(&self, ty: TypeHash) -> Value {
        match self.registry.get(ty) {
            Some(shape) => shape.default_value(),
            None => Value::Null,
        }
    }

    fn box_value(&self, value: Value) -> Value {
        match value {
            Value::Boxed(_) | Value::Null => value,
            // A nullable boxes as its payload, or as null when empty
            Value::Nullable(n) => match n.value {
                Some(inner) => Value::Boxed(Arc::new(*inner)),
                None => Value::Null,
            },
            other => {
                let is_value_type = self
                    .registry
                    .get(other.type_hash())
                    .is_some_and(|shape| shape.is_value_type());
                if is_value_type {
                    Value::Boxed(Arc::new(other))
                } else {
                    other
                }
            }
        }
    }

    fn convert_value(&self, value: Value, to: TypeHash) -> Result<Value, ConversionError> {
        let target = self
            .registry
            .get(to)
            .ok_or(ConversionError::UnknownType(to))?;

        if let Some(kind) = target.numeric {
            let inner = value.unboxed();
            if inner.numeric_kind() == Some(kind) {
                return Ok(inner.clone());
            }
            return inner.cast_numeric(kind).ok_or_else(|| {
                ConversionError::InvalidCast(format!(
                    "cannot read {} as {}",
                    self.registry.name_of(inner.type_hash()),
                    target.name
                ))
            });
        }

        if target.is_value_type() {
            if value.is_null() {
                return Err(ConversionError::InvalidCast(format!(
                    "null cannot be read as value type {}",
                    target.name
                )));
            }
            return Ok(value.unboxed().clone());
        }

        if to == well_known::OBJECT {
            return Ok(self.box_value(value));
        }

        // Reference conversions keep the reference
        Ok(value)
    }

    fn get_enumerator(&self, value: Value, enumerator: TypeHash) -> Result<Value, ConversionError> {
        match value.unboxed() {
            Value::Object(object) => Ok(Value::Enumerator(Arc::new(EnumeratorValue::new(
                enumerator,
                object.elements.clone(),
            )))),
            other => Err(ConversionError::NotEnumerable(self.registry.name_of(other.type_hash()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use dynbind_core::{ConversionOperator, ObjectValue, TypeShape};

    use crate::cache::SiteId;
    use crate::request::{ConversionRequest, ResultKind};
    use crate::rule::{RuleBuilder, Strategy};

    fn registry() -> TypeRegistry {
        TypeRegistry::with_builtins()
    }

    fn rule_for(
        registry: &TypeRegistry,
        kind: ResultKind,
        target: Computation,
        temporaries: &[&str],
    ) -> Rule {
        let request = ConversionRequest::new(
            registry.get(well_known::OBJECT).unwrap(),
            registry.get(well_known::INT32).unwrap(),
            kind,
        );
        let mut builder = RuleBuilder::new(&request);
        for name in temporaries {
            builder.declare_temporary(*name, well_known::OBJECT);
        }
        builder.set_success(Strategy::Assignable, target);
        builder.build(0)
    }

    fn run(
        registry: &TypeRegistry,
        target: Computation,
        input: Value,
    ) -> Result<Value, ConversionError> {
        let rule = rule_for(registry, ResultKind::ImplicitCast, target, &[]);
        Interpreter::new(registry, &NoNesting).execute(&rule, input)
    }

    struct Doubling;

    impl NestedConverter for Doubling {
        fn convert_nested(
            &self,
            conversion: &NestedConversion,
            value: Value,
        ) -> Result<Value, ConversionError> {
            match (value.unboxed(), conversion.target) {
                (Value::Int32(v), well_known::INT32) => Ok(Value::Int32(v * 2)),
                _ if conversion.returns_object => Ok(Value::Null),
                _ => Err(ConversionError::InvalidCast("nested".into())),
            }
        }
    }

    fn nested(returns_object: bool) -> NestedConversion {
        NestedConversion {
            site: SiteId(1),
            source: well_known::OBJECT,
            target: well_known::INT32,
            kind: ResultKind::ExplicitTry,
            returns_object,
        }
    }

    #[test]
    fn input_passes_through() {
        let reg = registry();
        let s = Value::string("hi");
        let out = run(&reg, Computation::Input, s.clone()).unwrap();
        assert!(Value::same_ref(&s, &out));
    }

    #[test]
    fn boxing_value_types_only() {
        let reg = registry();
        let boxed = run(
            &reg,
            Computation::boxed(Computation::Input),
            Value::Int32(5),
        )
        .unwrap();
        assert!(matches!(boxed, Value::Boxed(ref inner) if **inner == Value::Int32(5)));

        // Already boxed values are not boxed again
        let again = run(&reg, Computation::boxed(Computation::Input), boxed.clone()).unwrap();
        assert!(Value::same_ref(&boxed, &again));

        let s = Value::string("x");
        let out = run(&reg, Computation::boxed(Computation::Input), s.clone()).unwrap();
        assert!(Value::same_ref(&s, &out));
    }

    #[test]
    fn boxing_nullable_boxes_payload() {
        let reg = registry();
        let out = run(
            &reg,
            Computation::boxed(Computation::Input),
            Value::nullable(well_known::INT32, Value::Int32(3)),
        )
        .unwrap();
        assert_eq!(out, Value::Boxed(Arc::new(Value::Int32(3))));

        let empty = run(
            &reg,
            Computation::boxed(Computation::Input),
            Value::empty_nullable(well_known::INT32),
        )
        .unwrap();
        assert!(empty.is_null());
    }

    #[test]
    fn convert_unboxes_and_widens() {
        let reg = registry();
        let out = run(
            &reg,
            Computation::convert(Computation::Input, well_known::INT64),
            Value::Boxed(Arc::new(Value::Int32(-7))),
        )
        .unwrap();
        assert_eq!(out, Value::Int64(-7));

        let out = run(
            &reg,
            Computation::convert(Computation::Input, well_known::FLOAT64),
            Value::UInt16(300),
        )
        .unwrap();
        assert_eq!(out, Value::Float64(300.0));
    }

    #[test]
    fn convert_rejects_null_for_value_type() {
        let reg = registry();
        let err = run(
            &reg,
            Computation::convert(Computation::Input, well_known::BOOL),
            Value::Null,
        )
        .unwrap_err();
        assert!(matches!(err, ConversionError::InvalidCast(_)));
    }

    #[test]
    fn convert_to_unknown_type_fails() {
        let reg = registry();
        let ghost = TypeHash::from_name("Ghost");
        let err = run(
            &reg,
            Computation::convert(Computation::Input, ghost),
            Value::Int32(1),
        )
        .unwrap_err();
        assert_eq!(err, ConversionError::UnknownType(ghost));
    }

    #[test]
    fn extensible_value_reads_payload() {
        let reg = registry();
        let ext = reg.extensible_of(well_known::STRING).unwrap();
        let out = run(
            &reg,
            Computation::extensible_value(Computation::Input),
            Value::extensible(ext.hash, Value::string("payload")),
        )
        .unwrap();
        assert_eq!(out, Value::string("payload"));

        let err = run(
            &reg,
            Computation::extensible_value(Computation::Input),
            Value::Int32(1),
        )
        .unwrap_err();
        assert!(matches!(err, ConversionError::InvalidCast(_)));
    }

    #[test]
    fn call_invokes_operator() {
        let reg = registry();
        let op = ConversionOperator::implicit(
            well_known::INT32,
            well_known::INT32,
            well_known::STRING,
            |v| match v {
                Value::Int32(n) => Ok(Value::string(n.to_string())),
                _ => Err(ConversionError::operator_failed("op_Implicit", "not an int")),
            },
        );
        let out = run(
            &reg,
            Computation::call(op.clone(), Computation::Input),
            Value::Int32(42),
        )
        .unwrap();
        assert_eq!(out, Value::string("42"));

        let err = run(
            &reg,
            Computation::call(op, Computation::Input),
            Value::Bool(true),
        )
        .unwrap_err();
        assert!(matches!(err, ConversionError::OperatorFailed { .. }));
    }

    #[test]
    fn nullable_construction() {
        let reg = registry();
        let empty = run(
            &reg,
            Computation::construct_nullable(well_known::INT32, None),
            Value::Null,
        )
        .unwrap();
        assert_eq!(empty, Value::empty_nullable(well_known::INT32));

        let full = run(
            &reg,
            Computation::construct_nullable(
                well_known::INT32,
                Some(Computation::convert(Computation::Input, well_known::INT32)),
            ),
            Value::Boxed(Arc::new(Value::Int32(5))),
        )
        .unwrap();
        assert_eq!(full, Value::nullable(well_known::INT32, Value::Int32(5)));
    }

    #[test]
    fn get_enumerator_over_elements() {
        let reg = registry();
        let list = reg
            .register(TypeShape::class("List").with_interface(well_known::ENUMERABLE))
            .unwrap();
        let value = Value::object(
            ObjectValue::new(list.hash).with_elements(vec![Value::Int32(1), Value::Int32(2)]),
        );
        let out = run(
            &reg,
            Computation::get_enumerator(Computation::Input, well_known::ENUMERATOR),
            value,
        )
        .unwrap();
        let Value::Enumerator(e) = out else {
            panic!("expected enumerator");
        };
        assert_eq!(e.next_item(), Some(Value::Int32(1)));
        assert_eq!(e.next_item(), Some(Value::Int32(2)));
        assert_eq!(e.next_item(), None);

        let err = run(
            &reg,
            Computation::get_enumerator(Computation::Input, well_known::ENUMERATOR),
            Value::Int32(3),
        )
        .unwrap_err();
        assert_eq!(err, ConversionError::NotEnumerable("int32".to_string()));
    }

    #[test]
    fn strings_are_not_enumerable() {
        let reg = registry();
        let err = run(
            &reg,
            Computation::get_enumerator(Computation::Input, well_known::ENUMERATOR),
            Value::string("abc"),
        )
        .unwrap_err();
        assert_eq!(err, ConversionError::NotEnumerable("string".to_string()));
    }

    #[test]
    fn make_delegate_wraps_callable() {
        let reg = registry();
        let callback = reg.register(TypeShape::delegate("Callback")).unwrap();
        let target = Value::string("callable");
        let out = run(
            &reg,
            Computation::make_delegate(Computation::Input, callback.hash),
            target.clone(),
        )
        .unwrap();
        let Value::Delegate(d) = out else {
            panic!("expected delegate");
        };
        assert_eq!(d.delegate_type, callback.hash);
        assert!(Value::same_ref(&d.target, &target));
    }

    #[test]
    fn throw_error_names_both_types() {
        let reg = registry();
        let err = run(
            &reg,
            Computation::throw_error(Computation::Input, well_known::INT32),
            Value::string("x"),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "cannot convert from 'string' to 'int32'");
    }

    #[test]
    fn sentinels_are_default_values() {
        let reg = registry();
        let interp = Interpreter::new(&reg, &NoNesting);
        assert_eq!(interp.sentinel(well_known::INT32), Value::Int32(0));
        assert_eq!(interp.sentinel(well_known::BOOL), Value::Bool(false));
        assert_eq!(interp.sentinel(well_known::STRING), Value::Null);
        assert_eq!(interp.sentinel(well_known::OBJECT), Value::Null);
        let nullable = reg.nullable_of(well_known::FLOAT64).unwrap();
        assert_eq!(
            interp.sentinel(nullable.hash),
            Value::empty_nullable(well_known::FLOAT64)
        );
    }

    #[test]
    fn try_catch_falls_back() {
        let reg = registry();
        let out = run(
            &reg,
            Computation::try_catch(
                Computation::throw_error(Computation::Input, well_known::INT32),
                Computation::ReturnSentinel(well_known::INT32),
            ),
            Value::string("x"),
        )
        .unwrap();
        assert_eq!(out, Value::Int32(0));
    }

    #[test]
    fn nested_result_tested_through_temporary() {
        let reg = registry();
        let tmp = TempId(0);
        let target = Computation::if_not_null(
            Computation::assign(tmp, Computation::nested(nested(true), Computation::Input)),
            Computation::construct_nullable(
                well_known::INT32,
                Some(Computation::convert(Computation::Temp(tmp), well_known::INT32)),
            ),
            Computation::ReturnSentinel(well_known::OBJECT),
        );
        let rule = rule_for(&reg, ResultKind::ExplicitTry, target, &["tmp"]);
        let interp = Interpreter::new(&reg, &Doubling);

        let out = interp.execute(&rule, Value::Int32(21)).unwrap();
        assert_eq!(out, Value::nullable(well_known::INT32, Value::Int32(42)));

        let out = interp.execute(&rule, Value::string("nope")).unwrap();
        assert!(out.is_null());
    }

    #[test]
    fn nested_cast_error_propagates_unchanged() {
        let reg = registry();
        let target = Computation::construct_nullable(
            well_known::INT32,
            Some(Computation::nested(nested(false), Computation::Input)),
        );
        let rule = rule_for(&reg, ResultKind::ExplicitCast, target, &[]);
        let err = Interpreter::new(&reg, &Doubling)
            .execute(&rule, Value::string("nope"))
            .unwrap_err();
        assert_eq!(err, ConversionError::InvalidCast("nested".into()));
    }
}
