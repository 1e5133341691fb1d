//! Debug tree rendering in the layout of `var_dump`

use quill_value::{ArrayKey, ArrayValue, Slot, Value};
use std::collections::HashSet;
use std::fmt::Write;

/// Render `value` as an indented tree
pub fn dump(value: &Value, indent: usize) -> String {
    let mut dumper = Dumper {
        out: String::new(),
        indent,
        open: HashSet::new(),
        open_vars: HashSet::new(),
    };
    dumper.value(value, 0);
    dumper.out
}

struct Dumper {
    out: String,
    indent: usize,
    /// Objects currently being rendered
    open: HashSet<u64>,
    /// Reference cells currently being rendered
    open_vars: HashSet<usize>,
}

impl Dumper {
    fn pad(&mut self, depth: usize) {
        self.out
            .extend(std::iter::repeat_n(' ', depth * self.indent));
    }

    fn value(&mut self, value: &Value, depth: usize) {
        self.pad(depth);
        match value {
            Value::Null => self.out.push_str("NULL\n"),
            Value::Bool(b) => {
                let _ = writeln!(self.out, "bool({b})");
            }
            Value::Int(i) => {
                let _ = writeln!(self.out, "int({i})");
            }
            Value::Float(d) => {
                let _ = writeln!(self.out, "float({})", Value::Float(*d));
            }
            Value::Str(s) => {
                let kind = if s.is_unicode() { "unicode" } else { "string" };
                let _ = writeln!(self.out, "{kind}({}) \"{}\"", s.len(), s.to_string_lossy());
            }
            Value::Array(a) => {
                let _ = writeln!(self.out, "array({}) {{", a.len());
                self.members(a, depth);
            }
            Value::Object(o) => {
                if !self.open.insert(o.id()) {
                    self.out.push_str("*RECURSION*\n");
                    return;
                }
                let _ = writeln!(
                    self.out,
                    "object({})#{} ({}) {{",
                    o.class_name(),
                    o.id(),
                    o.field_count()
                );
                self.members(&o.fields(), depth);
                self.open.remove(&o.id());
            }
        }
    }

    fn members(&mut self, array: &ArrayValue, depth: usize) {
        array.for_each_slot(|key, slot| {
            self.pad(depth + 1);
            match key {
                ArrayKey::Int(i) => {
                    let _ = writeln!(self.out, "[{i}]=>");
                }
                key => {
                    let _ = writeln!(self.out, "[\"{key}\"]=>");
                }
            }
            match slot {
                Slot::Value(value) => self.value(value, depth + 1),
                Slot::Var(var) => {
                    if !self.open_vars.insert(var.id()) {
                        self.pad(depth + 1);
                        self.out.push_str("*RECURSION*\n");
                        return;
                    }
                    self.value(&var.get(), depth + 1);
                    self.open_vars.remove(&var.id());
                }
            }
        });
        self.pad(depth);
        self.out.push_str("}\n");
    }
}
