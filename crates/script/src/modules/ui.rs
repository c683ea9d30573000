//! `ui`: minimal detail view elements
//!
//! Elements are maps tagged with a `kind` field, matching the host's
//! `UiElement` serialisation.

use serde_json::{json, Value};

use super::{arg, list_arg, str_arg};
use crate::surface::{CallContext, NativeFunction, NativeModule, NativeResult};
use crate::value::display;

pub fn module() -> NativeModule {
    NativeModule::new("ui", "Building blocks for custom detail views")
        .with(NativeFunction::new("text", "text(value)", "Plain text", 1, 1, text))
        .with(NativeFunction::new("heading", "heading(value)", "Heading text", 1, 1, heading))
        .with(NativeFunction::new("stack", "stack(children)", "Vertical container", 1, 1, stack))
        .with(NativeFunction::new("row", "row(children)", "Horizontal container", 1, 1, row))
        .with(NativeFunction::new("link", "link(label, url)", "Hyperlink", 2, 2, link))
        .with(NativeFunction::new("button", "button(label, action)", "Button invoking a result action", 2, 2, button))
        .with(NativeFunction::new("image", "image(source)", "Image from a path or URL", 1, 1, image))
}

fn text(_: &CallContext<'_>, args: &[Value]) -> NativeResult {
    Ok(json!({"kind": "text", "text": display(arg(args, 0))}))
}

fn heading(_: &CallContext<'_>, args: &[Value]) -> NativeResult {
    Ok(json!({"kind": "heading", "text": display(arg(args, 0))}))
}

fn stack(_: &CallContext<'_>, args: &[Value]) -> NativeResult {
    Ok(json!({"kind": "stack", "children": list_arg("stack", args, 0)?}))
}

fn row(_: &CallContext<'_>, args: &[Value]) -> NativeResult {
    Ok(json!({"kind": "row", "children": list_arg("row", args, 0)?}))
}

fn link(_: &CallContext<'_>, args: &[Value]) -> NativeResult {
    Ok(json!({
        "kind": "link",
        "label": display(arg(args, 0)),
        "url": str_arg("link", args, 1)?,
    }))
}

fn button(_: &CallContext<'_>, args: &[Value]) -> NativeResult {
    Ok(json!({
        "kind": "button",
        "label": display(arg(args, 0)),
        "action": str_arg("button", args, 1)?,
    }))
}

fn image(_: &CallContext<'_>, args: &[Value]) -> NativeResult {
    Ok(json!({"kind": "image", "source": str_arg("image", args, 0)?}))
}
