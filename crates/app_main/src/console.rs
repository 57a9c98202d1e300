//! Console presentation surface - prints listing deltas to stdout

use app_core::columns::{date_text, size_text};
use app_core::{DisplayFields, EnrichmentKind, InternalId, Payload, PresentationSurface, SurfaceEvent};
use serde_json::json;
use std::collections::HashMap;

pub struct ConsoleSurface {
    json: bool,
    /// Names of the items currently listed, for delta lines that carry only an id
    names: HashMap<InternalId, String>,
    icons: HashMap<InternalId, char>,
}

impl ConsoleSurface {
    pub fn new(json: bool) -> Self {
        Self {
            json,
            names: HashMap::new(),
            icons: HashMap::new(),
        }
    }

    fn line(&self, id: InternalId, fields: &DisplayFields) -> String {
        let icon = self.icons.get(&id).copied().unwrap_or(' ');
        format!(
            "{} {:<40} {:>10}  {}",
            icon,
            fields.display_name,
            size_text(&fields.attributes),
            date_text(fields.attributes.modified)
        )
    }

    fn name(&self, id: InternalId) -> &str {
        self.names.get(&id).map(String::as_str).unwrap_or("?")
    }

    fn print_text(&self, event: &SurfaceEvent) {
        match event {
            SurfaceEvent::Listing { epoch, items, groups } => {
                println!("== listing (epoch {}, {} items) ==", epoch.0, items.len());
                let mut current_group = None;
                for (id, fields) in items {
                    if fields.group != current_group {
                        current_group = fields.group;
                        if let Some(group) = groups.iter().find(|g| Some(g.id) == fields.group) {
                            println!("-- {} ({}) --", group.label, group.member_count);
                        }
                    }
                    println!("{}", self.line(*id, fields));
                }
            }
            SurfaceEvent::Reordered { items } => {
                println!("== reordered ({} items) ==", items.len());
                for (id, fields) in items {
                    println!("{}", self.line(*id, fields));
                }
            }
            SurfaceEvent::Inserted { id, index, fields } => {
                println!("+ [{}] {}", index, self.line(*id, fields));
            }
            SurfaceEvent::Removed { id } => println!("- {}", self.name(*id)),
            SurfaceEvent::Updated { id, fields } => println!("~ {}", self.line(*id, fields)),
            SurfaceEvent::Moved { id, from, to, fields } => {
                println!("> [{} -> {}] {}", from, to, self.line(*id, fields));
            }
            SurfaceEvent::GroupsChanged { groups } => {
                let labels: Vec<String> = groups
                    .iter()
                    .map(|g| format!("{} ({})", g.label, g.member_count))
                    .collect();
                println!("groups: {}", labels.join(", "));
            }
            SurfaceEvent::FieldReady { id, kind, payload } => match (kind, payload) {
                (EnrichmentKind::Column(column), Payload::Text(text)) if !text.is_empty() => {
                    println!("  {} {}: {}", self.name(*id), column.title(), text);
                }
                (EnrichmentKind::InfoTip, Payload::Text(text)) => {
                    println!("  {}: {}", self.name(*id), text.replace('\n', "; "));
                }
                _ => {}
            },
            SurfaceEvent::EnumerationIncomplete { reason } => {
                println!("!! listing incomplete: {}", reason);
            }
            SurfaceEvent::NavigationFailed { error } => println!("!! {}", error),
        }
    }

    fn print_json(&self, event: &SurfaceEvent) {
        let item = |id: &InternalId, f: &DisplayFields| {
            json!({
                "id": id.0,
                "name": f.display_name,
                "container": f.attributes.is_container,
                "size": f.attributes.size,
                "modified": f.attributes.modified,
                "group": f.group.map(|g| g.0),
            })
        };
        let value = match event {
            SurfaceEvent::Listing { epoch, items, groups } => json!({
                "event": "listing",
                "epoch": epoch.0,
                "items": items.iter().map(|(id, f)| item(id, f)).collect::<Vec<_>>(),
                "groups": groups.iter().map(|g| json!({
                    "id": g.id.0,
                    "label": g.label,
                    "count": g.member_count,
                })).collect::<Vec<_>>(),
            }),
            SurfaceEvent::Reordered { items } => json!({
                "event": "reordered",
                "items": items.iter().map(|(id, f)| item(id, f)).collect::<Vec<_>>(),
            }),
            SurfaceEvent::Inserted { id, index, fields } => {
                json!({ "event": "inserted", "index": index, "item": item(id, fields) })
            }
            SurfaceEvent::Removed { id } => json!({ "event": "removed", "id": id.0 }),
            SurfaceEvent::Updated { id, fields } => json!({ "event": "updated", "item": item(id, fields) }),
            SurfaceEvent::Moved { id, from, to, fields } => {
                json!({ "event": "moved", "from": from, "to": to, "item": item(id, fields) })
            }
            SurfaceEvent::GroupsChanged { groups } => json!({
                "event": "groups",
                "groups": groups.iter().map(|g| json!({
                    "id": g.id.0,
                    "label": g.label,
                    "count": g.member_count,
                })).collect::<Vec<_>>(),
            }),
            SurfaceEvent::FieldReady { id, kind, payload } => {
                let value = match payload {
                    Payload::Icon(icon) => json!({ "glyph": icon.glyph.to_string(), "color": icon.color }),
                    Payload::Thumbnail(t) => json!({ "width": t.width, "height": t.height }),
                    Payload::Text(text) => json!(text),
                    Payload::Unavailable => serde_json::Value::Null,
                };
                json!({ "event": "field", "id": id.0, "kind": format!("{:?}", kind), "value": value })
            }
            SurfaceEvent::EnumerationIncomplete { reason } => {
                json!({ "event": "incomplete", "reason": reason })
            }
            SurfaceEvent::NavigationFailed { error } => json!({ "event": "navigation_failed", "error": error }),
        };
        println!("{}", value);
    }

    /// Keep the id to name map in step with the listing
    fn track(&mut self, event: &SurfaceEvent) {
        match event {
            SurfaceEvent::Listing { items, .. } => {
                self.names.clear();
                self.icons.clear();
                self.names
                    .extend(items.iter().map(|(id, f)| (*id, f.display_name.clone())));
            }
            SurfaceEvent::Reordered { items } => {
                self.names
                    .extend(items.iter().map(|(id, f)| (*id, f.display_name.clone())));
            }
            SurfaceEvent::Inserted { id, fields, .. }
            | SurfaceEvent::Updated { id, fields }
            | SurfaceEvent::Moved { id, fields, .. } => {
                self.names.insert(*id, fields.display_name.clone());
            }
            SurfaceEvent::FieldReady {
                id,
                payload: Payload::Icon(icon),
                ..
            } => {
                self.icons.insert(*id, icon.glyph);
            }
            _ => {}
        }
    }
}

impl PresentationSurface for ConsoleSurface {
    fn deliver(&mut self, event: SurfaceEvent) {
        self.track(&event);
        if self.json {
            self.print_json(&event);
        } else {
            self.print_text(&event);
        }
        // Removed ids are never reused; forget them after printing
        if let SurfaceEvent::Removed { id } = event {
            self.names.remove(&id);
            self.icons.remove(&id);
        }
    }
}
