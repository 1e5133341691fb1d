//! Deferred call arguments
//!
//! A call argument such as `$a[0]`, `$a['k'][1]` or `$o->name` is handed to
//! the callee as an [`ArgValue`]: the access path, not its result. Whether the
//! path is read as a value or bound as a reference depends on the callee's
//! declared parameter mode, which is only known at the call site.
//!
//! Resolving a path by value never creates anything. Resolving it by
//! reference auto-vivifies the containers along the path and upgrades the
//! target slot to a [`Var`] shared with the caller. A thunk keeps no cached
//! result; resolving it twice reads the container twice.

use crate::key::{ArrayKey, IntoArrayKey};
use crate::object::ObjectHandle;
use crate::value::Value;
use crate::var::Var;

/// Declared mode of a callee parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParamMode {
    /// `function f($x)`
    #[default]
    ByValue,
    /// `function f(&$x)`
    ByRef,
}

/// A materialized argument
#[derive(Debug, Clone)]
pub enum ResolvedArg {
    /// Private copy of the value
    Value(Value),
    /// Reference shared with the caller's storage
    Var(Var),
}

impl ResolvedArg {
    /// Current value, read through the reference if bound
    pub fn value(&self) -> Value {
        match self {
            ResolvedArg::Value(v) => v.clone(),
            ResolvedArg::Var(var) => var.get(),
        }
    }

    /// The reference, if the argument was bound by reference
    pub fn as_var(&self) -> Option<&Var> {
        match self {
            ResolvedArg::Var(var) => Some(var),
            ResolvedArg::Value(_) => None,
        }
    }
}

/// Container an access path starts from
#[derive(Debug, Clone)]
pub enum ArgBase {
    /// A variable (`$a`)
    Var(Var),
    /// A nested access path (`$a[0]` in `$a[0][1]`)
    Arg(Box<ArgValue>),
    /// An object (`$this`)
    Object(ObjectHandle),
}

impl ArgBase {
    fn value(&self) -> Value {
        match self {
            ArgBase::Var(var) => var.get(),
            ArgBase::Arg(arg) => arg.to_value(),
            ArgBase::Object(o) => Value::Object(o.clone()),
        }
    }

    fn var(&self) -> Var {
        match self {
            ArgBase::Var(var) => var.clone(),
            ArgBase::Arg(arg) => arg.to_ref_value(),
            ArgBase::Object(o) => Var::new(Value::Object(o.clone())),
        }
    }
}

/// Deferred argument access path
#[derive(Debug, Clone)]
pub enum ArgValue {
    /// `base[index]`
    GetValue {
        /// Container
        base: ArgBase,
        /// Element key
        index: ArrayKey,
    },
    /// `base->field`
    GetFieldValue {
        /// Object
        base: ArgBase,
        /// Field name
        field: ArrayKey,
    },
    /// An already bound reference (`&$x` at the call site)
    Ref(Var),
}

impl ArgValue {
    /// `$var[index]`
    pub fn index(var: &Var, index: impl IntoArrayKey) -> Self {
        ArgValue::GetValue {
            base: ArgBase::Var(var.clone()),
            index: index.into_array_key(),
        }
    }

    /// `$var->field`
    pub fn field(var: &Var, field: impl IntoArrayKey) -> Self {
        ArgValue::GetFieldValue {
            base: ArgBase::Var(var.clone()),
            field: field.into_array_key(),
        }
    }

    /// `self[index]`
    pub fn then_index(self, index: impl IntoArrayKey) -> Self {
        ArgValue::GetValue {
            base: ArgBase::Arg(Box::new(self)),
            index: index.into_array_key(),
        }
    }

    /// `self->field`
    pub fn then_field(self, field: impl IntoArrayKey) -> Self {
        ArgValue::GetFieldValue {
            base: ArgBase::Arg(Box::new(self)),
            field: field.into_array_key(),
        }
    }

    /// Read the current value without creating anything; missing is null
    pub fn to_value(&self) -> Value {
        match self {
            ArgValue::GetValue { base, index } => {
                base.value().get_index(index).unwrap_or_default()
            }
            ArgValue::GetFieldValue { base, field } => match base.value() {
                Value::Object(o) => o.get_field(field).unwrap_or_default(),
                _ => Value::Null,
            },
            ArgValue::Ref(var) => var.get(),
        }
    }

    /// Private copy for a by-value parameter
    pub fn to_local_value(&self) -> Value {
        self.to_value()
    }

    /// Bind the path as a reference, vivifying containers along the way
    pub fn to_ref_value(&self) -> Var {
        match self {
            ArgValue::GetValue { base, index } => {
                let var = base.var();
                warn_if_scalar(&var);
                var.with_mut(|container| container.element_var(index))
            }
            ArgValue::GetFieldValue { base, field } => {
                let var = base.var();
                warn_if_scalar(&var);
                var.with_mut(|container| container.field_var(field))
            }
            ArgValue::Ref(var) => var.clone(),
        }
    }

    /// Reference for a parameter declared `&$x`
    pub fn to_local_var_decl_as_ref(&self) -> Var {
        self.to_ref_value()
    }

    /// Local variable for a by-value parameter; a bound reference stays bound
    pub fn to_local_var(&self) -> Var {
        match self {
            ArgValue::Ref(var) => var.clone(),
            _ => Var::new(self.to_local_value()),
        }
    }

    /// Materialize for a parameter declared with `mode`
    pub fn resolve(&self, mode: ParamMode) -> ResolvedArg {
        match mode {
            ParamMode::ByValue => ResolvedArg::Value(self.to_local_value()),
            ParamMode::ByRef => ResolvedArg::Var(self.to_local_var_decl_as_ref()),
        }
    }
}

fn warn_if_scalar(var: &Var) {
    let scalar = var.with(|v| {
        !v.is_empty() && !matches!(v, Value::Array(_) | Value::Object(_))
    });
    if scalar {
        tracing::warn!(
            target: "quill::arg",
            "reference argument into a scalar; writes go to a detached slot"
        );
    }
}

impl From<Var> for ArgValue {
    fn from(var: Var) -> Self {
        ArgValue::Ref(var)
    }
}
