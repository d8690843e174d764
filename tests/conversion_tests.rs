//! End-to-end conversion behavior: resolution plus execution through call sites.


use dynbind::*;
use test_harness::{Harness, Zoo, meters, register_meters};

// ============================================================================
// Identity and boxing
// ============================================================================

#[test]
fn test_reference_identity_round_trip() {
    let h = Harness::new();
    let zoo = Zoo::register(&h);
    let dog = h.object(zoo.dog);

    let rule = h.resolve(zoo.dog, zoo.dog, ResultKind::ImplicitCast, &dog);
    assert_eq!(rule.strategy(), Strategy::Assignable);
    assert!(rule.guard().is_unconditional());

    let out = h
        .convert(zoo.dog, zoo.dog, ResultKind::ImplicitCast, dog.clone())
        .unwrap();
    assert!(Value::same_ref(&dog, &out));
}

#[test]
fn test_value_identity_round_trip() {
    let h = Harness::new();
    for kind in NumericKind::ALL {
        let ty = kind.type_hash();
        let value = Value::zero(kind);
        let rule = h.resolve(ty, ty, ResultKind::ImplicitCast, &value);
        assert!(rule.guard().is_unconditional(), "{kind:?}");
        let out = h
            .convert(ty, ty, ResultKind::ImplicitCast, value.clone())
            .unwrap();
        assert_eq!(out, value);
    }
}

#[test]
fn test_value_type_boxes_to_object() {
    let h = Harness::new();
    let out = h
        .convert(
            well_known::INT32,
            well_known::OBJECT,
            ResultKind::ImplicitCast,
            Value::Int32(9),
        )
        .unwrap();
    assert_eq!(out, Value::Boxed(Value::Int32(9).into()));
}

#[test]
fn test_boxed_value_is_not_reboxed() {
    let h = Harness::new();
    let boxed = Value::Boxed(Value::Float64(1.5).into());
    let out = h
        .convert(
            well_known::OBJECT,
            well_known::OBJECT,
            ResultKind::ImplicitCast,
            boxed.clone(),
        )
        .unwrap();
    assert!(Value::same_ref(&boxed, &out));
}

#[test]
fn test_upcast_keeps_reference() {
    let h = Harness::new();
    let zoo = Zoo::register(&h);
    let puppy = h.object(zoo.puppy);
    for target in [zoo.dog, zoo.animal, zoo.printable] {
        let out = h
            .convert(zoo.puppy, target, ResultKind::ImplicitCast, puppy.clone())
            .unwrap();
        assert!(Value::same_ref(&puppy, &out));
    }
}

#[test]
fn test_downcast_from_object_guarded_on_runtime_type() {
    let h = Harness::new();
    let zoo = Zoo::register(&h);
    let dog = h.object(zoo.dog);
    let rule = h.resolve(
        well_known::OBJECT,
        zoo.animal,
        ResultKind::ImplicitCast,
        &dog,
    );
    assert_eq!(rule.strategy(), Strategy::Assignable);
    assert_eq!(rule.guard().exact_types(), &[zoo.dog]);
}

// ============================================================================
// Numeric widening
// ============================================================================

#[test]
fn test_widening_is_antisymmetric_and_transitive() {
    let h = Harness::new();
    let widens = |a: NumericKind, b: NumericKind| {
        h.binder
            .can_convert(a.type_hash(), b.type_hash(), ResultKind::ImplicitCast)
    };

    for a in NumericKind::ALL {
        for b in NumericKind::ALL {
            if a != b {
                assert!(!(widens(a, b) && widens(b, a)), "{a:?} <-> {b:?}");
            }
            for c in NumericKind::ALL {
                if widens(a, b) && widens(b, c) {
                    assert!(widens(a, c), "{a:?} -> {b:?} -> {c:?}");
                }
            }
        }
    }
}

#[test]
fn test_widening_preserves_value() {
    let h = Harness::new();
    let cases = [
        (Value::UInt8(200), well_known::INT16, Value::Int16(200)),
        (Value::Int8(-5), well_known::INT64, Value::Int64(-5)),
        (Value::UInt32(7), well_known::UINT64, Value::UInt64(7)),
        (
            Value::Int16(-300),
            well_known::FLOAT32,
            Value::Float32(-300.0),
        ),
        (
            Value::Int32(1 << 20),
            well_known::FLOAT64,
            Value::Float64(1048576.0),
        ),
        (
            Value::Float32(0.5),
            well_known::FLOAT64,
            Value::Float64(0.5),
        ),
    ];
    for (input, target, expected) in cases {
        let from = input.type_hash();
        let out = h
            .convert(from, target, ResultKind::ImplicitCast, input)
            .unwrap();
        assert_eq!(out, expected);
    }
}

#[test]
fn test_narrowing_is_never_silent() {
    let h = Harness::new();
    for kind in [ResultKind::ImplicitCast, ResultKind::ExplicitCast] {
        let err = h
            .convert(well_known::INT64, well_known::INT32, kind, Value::Int64(1))
            .unwrap_err();
        assert!(matches!(
            err,
            BindingError::Conversion(ConversionError::NoConversion { .. })
        ));
    }
    assert!(!h.binder.can_convert(
        well_known::INT8,
        well_known::UINT64,
        ResultKind::ExplicitTry
    ));
}

#[test]
fn test_boxed_numeric_widens_through_runtime_stage() {
    let h = Harness::new();
    let out = h
        .convert(
            well_known::OBJECT,
            well_known::FLOAT64,
            ResultKind::ImplicitCast,
            Value::Boxed(Value::UInt16(12).into()),
        )
        .unwrap();
    assert_eq!(out, Value::Float64(12.0));
}

// ============================================================================
// Nullable
// ============================================================================

#[test]
fn test_null_to_nullable_is_empty() {
    let h = Harness::new();
    let nullable = h.registry().nullable_of(well_known::INT32).unwrap();
    let out = h
        .convert(
            well_known::NULL,
            nullable.hash,
            ResultKind::ImplicitCast,
            Value::Null,
        )
        .unwrap();
    assert_eq!(out, Value::empty_nullable(well_known::INT32));
}

#[test]
fn test_payload_to_nullable_wraps() {
    let h = Harness::new();
    let nullable = h.registry().nullable_of(well_known::INT32).unwrap();
    let out = h
        .convert(
            well_known::INT32,
            nullable.hash,
            ResultKind::ImplicitCast,
            Value::Int32(5),
        )
        .unwrap();
    assert_eq!(out, Value::nullable(well_known::INT32, Value::Int32(5)));
}

#[test]
fn test_mismatched_payload_fails_per_kind() {
    let h = Harness::new();
    let nullable = h.registry().nullable_of(well_known::STRING).unwrap();

    let err = h
        .convert(
            well_known::INT32,
            nullable.hash,
            ResultKind::ImplicitCast,
            Value::Int32(5),
        )
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "cannot convert from 'int32' to 'Nullable<string>'"
    );

    let out = h
        .convert(
            well_known::INT32,
            nullable.hash,
            ResultKind::ImplicitTry,
            Value::Int32(5),
        )
        .unwrap();
    assert_eq!(out, Value::empty_nullable(well_known::STRING));
}

#[test]
fn test_explicit_nullable_converts_then_wraps() {
    let h = Harness::new();
    let nullable = h.registry().nullable_of(well_known::FLOAT64).unwrap();
    let out = h
        .convert(
            well_known::OBJECT,
            nullable.hash,
            ResultKind::ExplicitCast,
            Value::Boxed(Value::Int16(3).into()),
        )
        .unwrap();
    assert_eq!(
        out,
        Value::nullable(well_known::FLOAT64, Value::Float64(3.0))
    );
}

#[test]
fn test_explicit_nullable_failure_matches_direct_failure() {
    let h = Harness::new();
    let nullable = h.registry().nullable_of(well_known::INT32).unwrap();

    let direct = h
        .convert(
            well_known::OBJECT,
            well_known::INT32,
            ResultKind::ExplicitCast,
            Value::string("x"),
        )
        .unwrap_err();
    let wrapped = h
        .convert(
            well_known::OBJECT,
            nullable.hash,
            ResultKind::ExplicitCast,
            Value::string("x"),
        )
        .unwrap_err();
    assert_eq!(direct, wrapped);
}

#[test]
fn test_explicit_try_nullable_failure_yields_default() {
    let h = Harness::new();
    let nullable = h.registry().nullable_of(well_known::INT32).unwrap();
    let out = h
        .convert(
            well_known::OBJECT,
            nullable.hash,
            ResultKind::ExplicitTry,
            Value::string("x"),
        )
        .unwrap();
    assert_eq!(out, Value::empty_nullable(well_known::INT32));

    let out = h
        .convert(
            well_known::OBJECT,
            nullable.hash,
            ResultKind::ExplicitTry,
            Value::Boxed(Value::UInt8(4).into()),
        )
        .unwrap();
    assert_eq!(out, Value::nullable(well_known::INT32, Value::Int32(4)));
}

// ============================================================================
// Failure behavior
// ============================================================================

#[test]
fn test_try_never_throws() {
    let h = Harness::new();
    let zoo = Zoo::register(&h);
    let widget = h.object(zoo.widget);

    for kind in [ResultKind::ImplicitTry, ResultKind::ExplicitTry] {
        let rule = h.resolve(zoo.widget, zoo.printable, kind, &widget);
        assert!(rule.is_error());
        let out = h
            .convert(zoo.widget, zoo.printable, kind, widget.clone())
            .unwrap();
        assert!(out.is_null());
    }
}

#[test]
fn test_cast_failure_names_both_types() {
    let h = Harness::new();
    let zoo = Zoo::register(&h);
    let err = h
        .convert(
            zoo.widget,
            zoo.printable,
            ResultKind::ImplicitCast,
            h.object(zoo.widget),
        )
        .unwrap_err();
    let BindingError::Conversion(ConversionError::NoConversion {
        from,
        from_name,
        to,
        to_name,
    }) = err
    else {
        panic!("expected a no-conversion error, got {err:?}");
    };
    assert_eq!((from, to), (zoo.widget, zoo.printable));
    assert_eq!(from_name, "Widget");
    assert_eq!(to_name, "IPrintable");
}

#[test]
fn test_try_sentinels_are_defaults() {
    let h = Harness::new();
    let cases = [
        (well_known::INT64, Value::Int64(0)),
        (well_known::FLOAT32, Value::Float32(0.0)),
        (well_known::BOOL, Value::Bool(false)),
        (well_known::STRING, Value::Null),
    ];
    for (target, expected) in cases {
        let out = h
            .convert(
                well_known::OBJECT,
                target,
                ResultKind::ImplicitTry,
                Value::Delegate(
                    DelegateValue {
                        delegate_type: well_known::DELEGATE,
                        target: Value::Null,
                    }
                    .into(),
                ),
            )
            .unwrap();
        assert_eq!(out, expected);
    }
}

#[test]
fn test_resolution_is_deterministic() {
    let h = Harness::new();
    let zoo = Zoo::register(&h);
    let nullable = h.registry().nullable_of(well_known::INT32).unwrap();
    let values = [
        (well_known::OBJECT, Value::Int32(1)),
        (zoo.dog, h.object(zoo.dog)),
        (well_known::NULL, Value::Null),
        (well_known::STRING, Value::string("s")),
    ];
    let targets = [zoo.animal, well_known::INT64, nullable.hash, zoo.printable];

    for kind in ResultKind::ALL {
        for (from, value) in &values {
            for &to in &targets {
                let a = h.resolve(*from, to, kind, value);
                let b = h.resolve(*from, to, kind, value);
                assert_eq!(a, b);
                assert_eq!(a.to_string(), b.to_string());
            }
        }
    }
}

// ============================================================================
// User-defined operators
// ============================================================================

#[test]
fn test_implicit_operator_on_target() {
    let h = Harness::new();
    let meters_ty = register_meters(&h);
    let out = h
        .convert(
            well_known::FLOAT64,
            meters_ty,
            ResultKind::ImplicitCast,
            Value::Float64(2.5),
        )
        .unwrap();
    let Value::Object(o) = out else {
        panic!("expected Meters");
    };
    assert_eq!(o.type_hash, meters_ty);
    assert_eq!(o.field("value"), Some(&Value::Float64(2.5)));
}

#[test]
fn test_explicit_only_operator() {
    let h = Harness::new();
    let meters_ty = register_meters(&h);

    assert!(!h
        .binder
        .can_convert(meters_ty, well_known::INT32, ResultKind::ImplicitCast));

    let out = h
        .convert(
            meters_ty,
            well_known::INT32,
            ResultKind::ExplicitCast,
            meters(7.9),
        )
        .unwrap();
    assert_eq!(out, Value::Int32(7));

    let err = h
        .convert(
            meters_ty,
            well_known::INT32,
            ResultKind::ExplicitCast,
            meters(-1.0),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        BindingError::Conversion(ConversionError::OperatorFailed { .. })
    ));

    // The try kind swallows the operator failure
    let out = h
        .convert(
            meters_ty,
            well_known::INT32,
            ResultKind::ExplicitTry,
            meters(-1.0),
        )
        .unwrap();
    assert_eq!(out, Value::Int32(0));
}

#[test]
fn test_convert_to_method() {
    let h = Harness::new();
    let zoo = Zoo::register(&h);
    h.binder
        .register_extension_operator(ConversionOperator::new(
            zoo.animal,
            operator_names::convert_to("string"),
            zoo.animal,
            well_known::STRING,
            |_| Ok(Value::string("an animal")),
        ))
        .unwrap();

    // Inherited by Dog through the base chain
    let out = h
        .convert(
            zoo.dog,
            well_known::STRING,
            ResultKind::ImplicitCast,
            h.object(zoo.dog),
        )
        .unwrap();
    assert_eq!(out, Value::string("an animal"));
}

#[test]
fn test_source_operator_preferred_over_target() {
    let h = Harness::new();
    let source = TypeHash::from_name("Source");
    let target = TypeHash::from_name("Target");
    h.register(TypeShape::class("Target").with_operator(ConversionOperator::implicit(
        target,
        source,
        target,
        |_| Ok(Value::string("target")),
    )));
    // Source is registered after Target so its operator can name Target
    h.register(TypeShape::class("Source"));
    h.binder
        .register_extension_operator(ConversionOperator::implicit(
            source,
            source,
            target,
            |_| Ok(Value::string("source")),
        ))
        .unwrap();

    let out = h
        .convert(source, target, ResultKind::ImplicitCast, h.object(source))
        .unwrap();
    assert_eq!(out, Value::string("source"));
}

// ============================================================================
// Extensible wrappers
// ============================================================================

#[test]
fn test_extensible_unwraps_payload() {
    let h = Harness::new();
    let ext = h.registry().extensible_of(well_known::STRING).unwrap();
    let payload = Value::string("wrapped");
    let out = h
        .convert(
            ext.hash,
            well_known::STRING,
            ResultKind::ImplicitCast,
            Value::extensible(ext.hash, payload.clone()),
        )
        .unwrap();
    assert!(Value::same_ref(&payload, &out));
}

#[test]
fn test_direct_extensible_numeric_widens() {
    let h = Harness::new();
    let ext = h.registry().extensible_of(well_known::INT32).unwrap();
    let out = h
        .convert(
            ext.hash,
            well_known::FLOAT64,
            ResultKind::ImplicitCast,
            Value::extensible(ext.hash, Value::Int32(6)),
        )
        .unwrap();
    assert_eq!(out, Value::Float64(6.0));
}

#[test]
fn test_extensible_subclass_uses_payload_operators() {
    let h = Harness::new();
    let meters_ty = register_meters(&h);
    let ext = h.registry().extensible_of(well_known::FLOAT64).unwrap();
    let py_float = h
        .register(TypeShape::class("PyFloat").with_base(ext.hash))
        .hash;

    let out = h
        .convert(
            py_float,
            meters_ty,
            ResultKind::ImplicitCast,
            Value::extensible(py_float, Value::Float64(4.0)),
        )
        .unwrap();
    let Value::Object(o) = out else {
        panic!("expected Meters");
    };
    assert_eq!(o.field("value"), Some(&Value::Float64(4.0)));

    let rule = h.resolve(
        py_float,
        well_known::FLOAT64,
        ResultKind::ImplicitCast,
        &Value::extensible(py_float, Value::Float64(1.0)),
    );
    assert_eq!(rule.strategy(), Strategy::ExtensibleUnwrap);
}

#[test]
fn test_numeric_widening_skips_extensible_subclasses() {
    let h = Harness::new();
    let ext = h.registry().extensible_of(well_known::INT32).unwrap();
    let py_int = h
        .register(TypeShape::class("PyInt").with_base(ext.hash))
        .hash;

    assert!(h
        .binder
        .can_convert(ext.hash, well_known::FLOAT64, ResultKind::ImplicitCast));
    assert!(!h
        .binder
        .can_convert(py_int, well_known::FLOAT64, ResultKind::ImplicitCast));
}

// ============================================================================
// Enumerables, delegates, null and COM
// ============================================================================

#[test]
fn test_enumerable_to_enumerator() {
    let h = Harness::new();
    let list = h
        .register(TypeShape::class("List").with_interface(well_known::ENUMERABLE))
        .hash;
    let value = Value::object(
        ObjectValue::new(list).with_elements(vec![Value::Int32(1), Value::string("two")]),
    );
    let out = h
        .convert(
            list,
            well_known::ENUMERATOR,
            ResultKind::ImplicitCast,
            value,
        )
        .unwrap();
    let Value::Enumerator(e) = out else {
        panic!("expected an enumerator");
    };
    assert_eq!(e.type_hash, well_known::ENUMERATOR);
    assert_eq!(e.len(), 2);
    assert_eq!(e.next_item(), Some(Value::Int32(1)));
}

#[test]
fn test_enumerable_of_t_to_enumerator_of_t() {
    let h = Harness::new();
    let ints = h.registry().enumerable_of(well_known::INT32).unwrap();
    let int_enumerator = h.registry().enumerator_of(well_known::INT32).unwrap();
    let strings = h.registry().enumerator_of(well_known::STRING).unwrap();
    let list = h
        .register(TypeShape::class("IntList").with_interface(ints.hash))
        .hash;
    let value = Value::object(ObjectValue::new(list).with_elements(vec![Value::Int32(3)]));

    let out = h
        .convert(list, int_enumerator.hash, ResultKind::ImplicitCast, value)
        .unwrap();
    assert!(matches!(out, Value::Enumerator(ref e) if e.type_hash == int_enumerator.hash));

    assert!(!h
        .binder
        .can_convert(list, strings.hash, ResultKind::ImplicitCast));
}

#[test]
fn test_delegate_synthesized_for_any_value() {
    let h = Harness::new();
    let callback = h.register(TypeShape::delegate("Callback")).hash;
    let callable = Value::string("lambda");
    let out = h
        .convert(
            well_known::OBJECT,
            callback,
            ResultKind::ImplicitCast,
            callable.clone(),
        )
        .unwrap();
    let Value::Delegate(d) = out else {
        panic!("expected a delegate");
    };
    assert_eq!(d.delegate_type, callback);
    assert!(Value::same_ref(&d.target, &callable));

    // The root delegate type is not synthesized
    assert!(h
        .convert(
            well_known::OBJECT,
            well_known::DELEGATE,
            ResultKind::ImplicitTry,
            callable,
        )
        .unwrap()
        .is_null());
}

#[test]
fn test_null_converts_to_references_only() {
    let h = Harness::new();
    let zoo = Zoo::register(&h);
    for target in [well_known::STRING, zoo.animal, zoo.printable] {
        let out = h
            .convert(
                well_known::NULL,
                target,
                ResultKind::ImplicitCast,
                Value::Null,
            )
            .unwrap();
        assert!(out.is_null());
    }
    assert!(h
        .convert(
            well_known::NULL,
            well_known::INT32,
            ResultKind::ImplicitCast,
            Value::Null,
        )
        .is_err());
}

#[test]
fn test_com_object_adapts_to_interfaces() {
    let h = Harness::new();
    let zoo = Zoo::register(&h);
    let com = h.register(TypeShape::com_object("Excel.Application")).hash;
    let app = h.object(com);

    let out = h
        .convert(com, zoo.printable, ResultKind::ImplicitCast, app.clone())
        .unwrap();
    assert!(Value::same_ref(&app, &out));

    let rule = h.resolve(com, well_known::ENUMERATOR, ResultKind::ImplicitCast, &app);
    assert_eq!(rule.strategy(), Strategy::Enumerable);
}

#[test]
fn test_com_adaptation_disabled() {
    let h = Harness::with_config(BinderConfig::default().with_com_interop(false));
    let zoo = Zoo::register(&h);
    let com = h.register(TypeShape::com_object("Excel.Application")).hash;
    let out = h
        .convert(com, zoo.printable, ResultKind::ImplicitTry, h.object(com))
        .unwrap();
    assert!(out.is_null());
}
