//! Space payload marking a persistence unit.

use super::{Payload, payload_any_methods};
use crate::error::RuntimeResult;
use crate::object::ObjectZone;
use crate::persist::DumpVisitor;
use crate::trace::Tracer;
use crate::zone::ZoneType;
use serde_json::{Map, Value as Json};

/// Marks its owner as a space. Objects refer to their space with
/// [`ObjectZone::put_space`].
#[derive(Debug, Default)]
pub struct SpaceInfo {
    description: Option<String>,
}

impl SpaceInfo {
    /// Space marker with an optional description.
    pub fn new(description: Option<&str>) -> Self {
        Self {
            description: description.map(str::to_owned),
        }
    }

    /// The description, if any.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Replace the description.
    pub fn put_description(&mut self, description: Option<&str>) {
        self.description = description.map(str::to_owned);
    }
}

impl Payload for SpaceInfo {
    fn payload_type(&self) -> ZoneType {
        ZoneType::PaylSpace
    }

    fn is_erasable(&self) -> bool {
        false
    }

    fn gc_mark(&self, _tracer: &mut dyn Tracer) {}

    fn dump_json_content(&self, _visitor: &dyn DumpVisitor, map: &mut Map<String, Json>) {
        if let Some(description) = &self.description {
            map.insert("space_descr".into(), Json::String(description.clone()));
        }
    }

    payload_any_methods!();
}

impl ObjectZone {
    /// Turn this object into a space.
    pub fn put_new_space_payload(&self, description: Option<&str>) -> RuntimeResult<()> {
        self.put_payload(Box::new(SpaceInfo::new(description)))
    }

    /// Whether this object is a space.
    pub fn is_space(&self) -> bool {
        self.has_payload_of::<SpaceInfo>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_space_is_permanent() {
        let space = ObjectZone::make();
        space.put_new_space_payload(Some("scratch")).unwrap();
        assert!(space.is_space());
        assert_eq!(
            space.with_payload::<SpaceInfo, _>(|info| info.description().map(str::to_owned)).unwrap(),
            Some("scratch".to_owned())
        );
        assert!(space.clear_payload().is_err());
    }
}
