use crate::error::{PlanError, PlanResult};
use dag::{BuildType, NavEvent, PlanItem};
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::Writer;
use std::io::Cursor;

/// Serialize the interleaved object/navigation stream back to the
/// `<dbobject action="…">` XML form of spec.md §6, "Output plan format".
/// The emitter only writes; it never executes anything (spec.md §1,
/// Non-goals).
pub fn emit_plan(items: &[PlanItem]) -> PlanResult<String> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

    let mut root = BytesStart::new("plan");
    root.push_attribute(("xmlns", "urn:schemasync:plan"));
    writer
        .write_event(Event::Start(root))
        .map_err(|e| PlanError::xml("failed to write <plan> root", e.into()))?;

    for item in items {
        write_item(&mut writer, item)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("plan")))
        .map_err(|e| PlanError::xml("failed to close </plan>", e.into()))?;

    let bytes = writer.into_inner().into_inner();
    String::from_utf8(bytes).map_err(|e| {
        PlanError::io(
            "plan output was not valid UTF-8",
            std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        )
    })
}

fn write_item(writer: &mut Writer<Cursor<Vec<u8>>>, item: &PlanItem) -> PlanResult<()> {
    let mut el = BytesStart::new("dbobject");
    match item {
        PlanItem::Object(node) => {
            el.push_attribute(("type", node.obj_type.as_str()));
            el.push_attribute(("fqn", node.fqn.as_str()));
            el.push_attribute(("action", action_for(node.build_type)));
        }
        PlanItem::Navigate(NavEvent::ContextDepart { name, value }) => {
            el.push_attribute(("type", "context"));
            el.push_attribute(("name", name.as_str()));
            el.push_attribute(("value", value.as_str()));
            el.push_attribute(("action", "depart"));
        }
        PlanItem::Navigate(NavEvent::ContextArrive { name, value }) => {
            el.push_attribute(("type", "context"));
            el.push_attribute(("name", name.as_str()));
            el.push_attribute(("value", value.as_str()));
            el.push_attribute(("action", "arrive"));
        }
        PlanItem::Navigate(NavEvent::ObjectDepart { fqn }) => {
            el.push_attribute(("fqn", fqn.as_str()));
            el.push_attribute(("action", "depart"));
        }
        PlanItem::Navigate(NavEvent::ObjectArrive { fqn }) => {
            el.push_attribute(("fqn", fqn.as_str()));
            el.push_attribute(("action", "arrive"));
        }
    }
    writer
        .write_event(Event::Empty(el))
        .map_err(|e| PlanError::xml("failed to write plan element", e.into()))
}

fn action_for(build_type: BuildType) -> &'static str {
    build_type.as_str()
}
