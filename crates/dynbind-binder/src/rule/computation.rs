//! The computation IR a rule runs when its guard passes.

use std::fmt;

use dynbind_core::{ConversionOperator, TypeHash, Value};

use crate::cache::SiteId;
use crate::request::ResultKind;

/// Handle to a temporary declared on a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TempId(pub u32);

/// A temporary binding declared by a rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Temporary {
    pub id: TempId,
    pub name: String,
    pub ty: TypeHash,
}

/// A conversion routed back through the binder at its own call site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NestedConversion {
    pub site: SiteId,
    /// Static shape of the converted expression.
    pub source: TypeHash,
    pub target: TypeHash,
    pub kind: ResultKind,
    /// The nested conversion produces `object`, so a failed try yields null.
    pub returns_object: bool,
}

/// A conversion expression tree.
///
/// Resolution builds these; the interpreter in [`exec`](crate::exec) runs them.
#[derive(Debug, Clone, PartialEq)]
pub enum Computation {
    /// The value being converted.
    Input,
    /// Read a declared temporary.
    Temp(TempId),
    Constant(Value),
    /// Box a value type as `object`.
    Box(Box<Computation>),
    /// Reinterpret as `to`: unbox a boxed value type, widen a numeric, or pass a
    /// reference through unchanged.
    Convert {
        value: Box<Computation>,
        to: TypeHash,
    },
    /// Read the payload of an `Extensible<T>`.
    ExtensibleValue(Box<Computation>),
    /// Invoke a conversion operator.
    Call {
        operator: ConversionOperator,
        arg: Box<Computation>,
    },
    /// Construct a `Nullable<payload>`, empty when `value` is `None`.
    ConstructNullable {
        payload: TypeHash,
        value: Option<Box<Computation>>,
    },
    /// Call the get-enumerator operation of an enumerable.
    GetEnumerator {
        value: Box<Computation>,
        enumerator: TypeHash,
    },
    /// Synthesize a delegate that invokes the value as a callable.
    MakeDelegate {
        value: Box<Computation>,
        delegate_type: TypeHash,
    },
    /// Run a nested dynamic conversion.
    Nested {
        conversion: NestedConversion,
        value: Box<Computation>,
    },
    /// Store into a temporary, yielding the stored value.
    Assign {
        temp: TempId,
        value: Box<Computation>,
    },
    /// Evaluate `test`; run `then` unless it produced null.
    IfNotNull {
        test: Box<Computation>,
        then: Box<Computation>,
        otherwise: Box<Computation>,
    },
    /// Yield the try sentinel of a result type.
    ReturnSentinel(TypeHash),
    /// Raise a no-conversion error naming the value's runtime type and `to`.
    ThrowError {
        value: Box<Computation>,
        to: TypeHash,
    },
    /// Run `body`; if it fails, run `fallback` instead.
    TryCatch {
        body: Box<Computation>,
        fallback: Box<Computation>,
    },
}

impl Computation {
    pub fn boxed(value: Computation) -> Self {
        Computation::Box(Box::new(value))
    }

    pub fn convert(value: Computation, to: TypeHash) -> Self {
        Computation::Convert {
            value: Box::new(value),
            to,
        }
    }

    pub fn extensible_value(value: Computation) -> Self {
        Computation::ExtensibleValue(Box::new(value))
    }

    pub fn call(operator: ConversionOperator, arg: Computation) -> Self {
        Computation::Call {
            operator,
            arg: Box::new(arg),
        }
    }

    pub fn construct_nullable(payload: TypeHash, value: Option<Computation>) -> Self {
        Computation::ConstructNullable {
            payload,
            value: value.map(Box::new),
        }
    }

    pub fn get_enumerator(value: Computation, enumerator: TypeHash) -> Self {
        Computation::GetEnumerator {
            value: Box::new(value),
            enumerator,
        }
    }

    pub fn make_delegate(value: Computation, delegate_type: TypeHash) -> Self {
        Computation::MakeDelegate {
            value: Box::new(value),
            delegate_type,
        }
    }

    pub fn nested(conversion: NestedConversion, value: Computation) -> Self {
        Computation::Nested {
            conversion,
            value: Box::new(value),
        }
    }

    pub fn assign(temp: TempId, value: Computation) -> Self {
        Computation::Assign {
            temp,
            value: Box::new(value),
        }
    }

    pub fn if_not_null(test: Computation, then: Computation, otherwise: Computation) -> Self {
        Computation::IfNotNull {
            test: Box::new(test),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        }
    }

    pub fn throw_error(value: Computation, to: TypeHash) -> Self {
        Computation::ThrowError {
            value: Box::new(value),
            to,
        }
    }

    pub fn try_catch(body: Computation, fallback: Computation) -> Self {
        Computation::TryCatch {
            body: Box::new(body),
            fallback: Box::new(fallback),
        }
    }

    /// Nested conversions this computation performs.
    pub fn nested_conversions(&self) -> Vec<&NestedConversion> {
        let mut found = Vec::new();
        self.collect_nested(&mut found);
        found
    }

    fn collect_nested<'a>(&'a self, out: &mut Vec<&'a NestedConversion>) {
        match self {
            Computation::Input
            | Computation::Temp(_)
            | Computation::Constant(_)
            | Computation::ReturnSentinel(_) => {}
            Computation::Box(v) | Computation::ExtensibleValue(v) => v.collect_nested(out),
            Computation::Convert { value, .. }
            | Computation::GetEnumerator { value, .. }
            | Computation::MakeDelegate { value, .. }
            | Computation::Assign { value, .. }
            | Computation::ThrowError { value, .. } => value.collect_nested(out),
            Computation::Call { arg, .. } => arg.collect_nested(out),
            Computation::ConstructNullable { value, .. } => {
                if let Some(v) = value {
                    v.collect_nested(out);
                }
            }
            Computation::Nested { conversion, value } => {
                out.push(conversion);
                value.collect_nested(out);
            }
            Computation::IfNotNull {
                test,
                then,
                otherwise,
            } => {
                test.collect_nested(out);
                then.collect_nested(out);
                otherwise.collect_nested(out);
            }
            Computation::TryCatch { body, fallback } => {
                body.collect_nested(out);
                fallback.collect_nested(out);
            }
        }
    }
}

impl fmt::Display for Computation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Computation::Input => write!(f, "input"),
            Computation::Temp(id) => write!(f, "t{}", id.0),
            Computation::Constant(v) => write!(f, "{v:?}"),
            Computation::Box(v) => write!(f, "box({v})"),
            Computation::Convert { value, to } => write!(f, "convert({value}, {to})"),
            Computation::ExtensibleValue(v) => write!(f, "{v}.Value"),
            Computation::Call { operator, arg } => write!(f, "{}({arg})", operator.name),
            Computation::ConstructNullable { payload, value } => match value {
                Some(v) => write!(f, "new Nullable<{payload}>({v})"),
                None => write!(f, "new Nullable<{payload}>()"),
            },
            Computation::GetEnumerator { value, .. } => write!(f, "{value}.GetEnumerator()"),
            Computation::MakeDelegate {
                value,
                delegate_type,
            } => write!(f, "delegate<{delegate_type}>({value})"),
            Computation::Nested { conversion, value } => {
                write!(f, "dynamic_convert<{}>({value})", conversion.target)
            }
            Computation::Assign { temp, value } => write!(f, "(t{} = {value})", temp.0),
            Computation::IfNotNull {
                test,
                then,
                otherwise,
            } => write!(f, "if {test} != null then {then} else {otherwise}"),
            Computation::ReturnSentinel(ty) => write!(f, "default({ty})"),
            Computation::ThrowError { to, .. } => write!(f, "throw no_conversion({to})"),
            Computation::TryCatch { body, fallback } => {
                write!(f, "try {body} catch {fallback}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dynbind_core::well_known;

    #[test]
    fn collects_nested_conversions() {
        let nested = NestedConversion {
            site: SiteId(7),
            source: well_known::OBJECT,
            target: well_known::INT32,
            kind: ResultKind::ExplicitTry,
            returns_object: true,
        };
        let tmp = TempId(0);
        let c = Computation::if_not_null(
            Computation::assign(tmp, Computation::nested(nested.clone(), Computation::Input)),
            Computation::construct_nullable(
                well_known::INT32,
                Some(Computation::convert(Computation::Temp(tmp), well_known::INT32)),
            ),
            Computation::ReturnSentinel(well_known::OBJECT),
        );
        assert_eq!(c.nested_conversions(), vec![&nested]);
        assert!(Computation::Input.nested_conversions().is_empty());
    }

    #[test]
    fn display() {
        let c = Computation::boxed(Computation::Input);
        assert_eq!(c.to_string(), "box(input)");
    }
}
