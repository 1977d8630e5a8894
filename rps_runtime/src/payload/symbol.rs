//! Symbol payload: the object side of a name binding.
//!
//! The global name table lives in [`crate::symbols`]; this payload records the
//! name on the owner together with an optional bound value.

use super::{Payload, payload_any_methods};
use crate::persist::DumpVisitor;
use crate::trace::{Trace, Tracer};
use crate::value::Value;
use crate::zone::ZoneType;
use serde_json::{Map, Value as Json};

/// Name, weakness and bound value of a symbol object.
#[derive(Debug)]
pub struct SymbolInfo {
    name: Box<str>,
    value: Value,
    weak: bool,
}

impl SymbolInfo {
    /// Unbound symbol payload.
    pub fn new(name: &str, weak: bool) -> Self {
        Self {
            name: name.into(),
            value: Value::empty(),
            weak,
        }
    }

    /// The registered name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the symbol is kept alive only by other references.
    #[inline]
    pub fn is_weak(&self) -> bool {
        self.weak
    }

    pub(crate) fn set_weak(&mut self, weak: bool) {
        self.weak = weak;
    }

    /// The bound value, empty when unbound.
    #[inline]
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Bind a value, returning the previous one.
    pub fn put_value(&mut self, value: Value) -> Value {
        std::mem::replace(&mut self.value, value)
    }
}

impl Payload for SymbolInfo {
    fn payload_type(&self) -> ZoneType {
        ZoneType::PaylSymbol
    }

    fn is_erasable(&self) -> bool {
        self.weak
    }

    fn gc_mark(&self, tracer: &mut dyn Tracer) {
        self.value.trace(tracer);
    }

    fn dump_json_content(&self, visitor: &dyn DumpVisitor, map: &mut Map<String, Json>) {
        map.insert("symb_name".into(), Json::String(self.name.to_string()));
        map.insert("symb_weak".into(), Json::Bool(self.weak));
        if !self.value.is_empty() {
            map.insert("symb_val".into(), self.value.dump_json(visitor));
        }
    }

    payload_any_methods!();
}
