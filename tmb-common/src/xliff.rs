//! XLIFF 1.2 export and import
//!
//! Vendors receive one XLIFF file per job item and deliver the translation
//! back in the same shape. Trans-unit ids carry the local identity as
//! `{job_item_id}][{flattened_key}` so the import side can route targets
//! back to the right item without vendor cooperation.

use crate::db::models::{Job, JobItem};
use crate::{Error, Result};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::collections::BTreeMap;

const XLIFF_NS: &str = "urn:oasis:names:tc:xliff:document:1.2";

/// Separator used by the host to flatten nested data keys.
pub const KEY_SEPARATOR: &str = "][";

/// Translated targets per job item, keyed by the flattened data key.
pub type ImportedTranslations = BTreeMap<i64, BTreeMap<String, String>>;

/// Export one job item as an XLIFF 1.2 document.
///
/// Fields with an empty source are skipped; vendors reject empty segments.
pub fn export(job: &Job, item: &JobItem) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    let w = &mut writer;

    write(w, Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;

    let mut xliff = BytesStart::new("xliff");
    xliff.push_attribute(("xmlns", XLIFF_NS));
    xliff.push_attribute(("version", "1.2"));
    write(w, Event::Start(xliff))?;

    let mut file = BytesStart::new("file");
    file.push_attribute(("original", format!("job-{}", job.id).as_str()));
    file.push_attribute(("source-language", job.source_langcode.as_str()));
    file.push_attribute(("target-language", job.target_langcode.as_str()));
    file.push_attribute(("datatype", "plaintext"));
    write(w, Event::Start(file))?;
    write(w, Event::Start(BytesStart::new("body")))?;

    let mut group = BytesStart::new("group");
    group.push_attribute(("id", item.id.to_string().as_str()));
    write(w, Event::Start(group))?;

    for (key, data_item) in &item.data {
        if data_item.source.trim().is_empty() {
            continue;
        }
        let mut unit = BytesStart::new("trans-unit");
        unit.push_attribute(("id", format!("{}{}{}", item.id, KEY_SEPARATOR, key).as_str()));
        unit.push_attribute(("resname", key.as_str()));
        write(w, Event::Start(unit))?;

        write(w, Event::Start(BytesStart::new("source")))?;
        write(w, Event::Text(BytesText::new(&data_item.source)))?;
        write(w, Event::End(BytesEnd::new("source")))?;

        write(w, Event::Start(BytesStart::new("target")))?;
        if let Some(translation) = &data_item.translation {
            write(w, Event::Text(BytesText::new(translation)))?;
        }
        write(w, Event::End(BytesEnd::new("target")))?;

        write(w, Event::End(BytesEnd::new("trans-unit")))?;
    }

    write(w, Event::End(BytesEnd::new("group")))?;
    write(w, Event::End(BytesEnd::new("body")))?;
    write(w, Event::End(BytesEnd::new("file")))?;
    write(w, Event::End(BytesEnd::new("xliff")))?;

    String::from_utf8(writer.into_inner()).map_err(|e| Error::Internal(e.to_string()))
}

fn write<W: std::io::Write>(writer: &mut Writer<W>, event: Event<'_>) -> Result<()> {
    writer
        .write_event(event)
        .map_err(|e| Error::Internal(e.to_string()))
}

/// Import translated XLIFF content.
///
/// Returns targets grouped by job item id. Trans-units without a local
/// `{item_id}][{key}` id or with an empty target are skipped; a document
/// with no usable trans-unit at all is a [`Error::Parse`].
pub fn import(content: &str) -> Result<ImportedTranslations> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut result: ImportedTranslations = BTreeMap::new();
    let mut seen_units = 0usize;
    let mut current_unit: Option<(i64, String)> = None;
    let mut in_target = false;
    let mut target_text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"trans-unit" => {
                    seen_units += 1;
                    current_unit = unit_identity(&e)?;
                    target_text.clear();
                }
                b"target" if current_unit.is_some() => {
                    in_target = true;
                    target_text.clear();
                }
                _ => {}
            },
            Ok(Event::Text(t)) if in_target => {
                let text = t.decode().map_err(|e| Error::Parse(e.to_string()))?;
                target_text.push_str(&text);
            }
            // Character and entity references inside text arrive as their
            // own events and must be folded back into the target
            Ok(Event::GeneralRef(r)) if in_target => {
                target_text.push_str(&resolve_reference(&r)?);
            }
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"target" => in_target = false,
                b"trans-unit" => {
                    if let Some((item_id, key)) = current_unit.take() {
                        if !target_text.is_empty() {
                            result
                                .entry(item_id)
                                .or_default()
                                .insert(key, std::mem::take(&mut target_text));
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(Error::Parse(e.to_string())),
        }
    }

    if seen_units == 0 {
        return Err(Error::Parse("no trans-unit elements in document".into()));
    }

    Ok(result)
}

/// Resolve a general reference event: numeric character references plus
/// the five predefined XML entities. Anything else is malformed content.
fn resolve_reference(r: &quick_xml::events::BytesRef<'_>) -> Result<String> {
    if let Some(ch) = r.resolve_char_ref().map_err(|e| Error::Parse(e.to_string()))? {
        return Ok(ch.to_string());
    }
    let name = r.decode().map_err(|e| Error::Parse(e.to_string()))?;
    let resolved = match name.as_ref() {
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "apos" => "'",
        "quot" => "\"",
        other => return Err(Error::Parse(format!("unknown entity reference &{other};"))),
    };
    Ok(resolved.to_string())
}

/// Split a trans-unit id attribute into (job item id, flattened key).
fn unit_identity(e: &BytesStart<'_>) -> Result<Option<(i64, String)>> {
    let attr = e
        .try_get_attribute("id")
        .map_err(|e| Error::Parse(e.to_string()))?;
    let Some(attr) = attr else {
        return Ok(None);
    };
    let id = attr
        .unescape_value()
        .map_err(|e| Error::Parse(e.to_string()))?;
    let Some((item_part, key)) = id.split_once(KEY_SEPARATOR) else {
        return Ok(None);
    };
    match item_part.parse::<i64>() {
        Ok(item_id) => Ok(Some((item_id, key.to_string()))),
        Err(_) => Ok(None),
    }
}

/// Expand a flat `a][b][c -> text` map into the host's nested structure.
pub fn unflatten(flat: &BTreeMap<String, String>) -> serde_json::Value {
    let mut root = serde_json::Map::new();
    for (key, value) in flat {
        let parts: Vec<&str> = key.split(KEY_SEPARATOR).collect();
        let mut node = &mut root;
        for part in &parts[..parts.len() - 1] {
            let entry = node
                .entry(part.to_string())
                .or_insert_with(|| serde_json::Value::Object(serde_json::Map::new()));
            // A leaf colliding with a deeper key loses to the structure
            if !entry.is_object() {
                *entry = serde_json::Value::Object(serde_json::Map::new());
            }
            match entry {
                serde_json::Value::Object(map) => node = map,
                _ => unreachable!(),
            }
        }
        node.insert(
            parts[parts.len() - 1].to_string(),
            serde_json::Value::String(value.clone()),
        );
    }
    serde_json::Value::Object(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{DataItem, DataItemState, JobItemState, JobState};
    use serde_json::json;

    fn sample_job() -> Job {
        Job {
            id: 7,
            label: "Front page".into(),
            translator: "tm-main".into(),
            source_langcode: "en".into(),
            target_langcode: "fr".into(),
            state: JobState::Unprocessed,
            project_template: None,
            due_date: None,
        }
    }

    fn sample_item() -> JobItem {
        let mut data = BTreeMap::new();
        data.insert(
            "title][0][value".to_string(),
            DataItem {
                source: "Hello <world> & friends".into(),
                translation: None,
                state: DataItemState::Pending,
            },
        );
        data.insert(
            "body][0][value".to_string(),
            DataItem {
                source: "Second field".into(),
                translation: None,
                state: DataItemState::Pending,
            },
        );
        data.insert(
            "empty][0][value".to_string(),
            DataItem {
                source: "   ".into(),
                translation: None,
                state: DataItemState::Pending,
            },
        );
        JobItem {
            id: 42,
            job_id: 7,
            item_type: "node".into(),
            item_key: "1".into(),
            label: "Page".into(),
            state: JobItemState::Inactive,
            data,
            word_count: 5,
        }
    }

    #[test]
    fn export_skips_empty_sources_and_escapes() {
        let xliff = export(&sample_job(), &sample_item()).unwrap();
        assert!(xliff.contains("source-language=\"en\""));
        assert!(xliff.contains("target-language=\"fr\""));
        assert!(xliff.contains("42][title][0][value"));
        assert!(xliff.contains("Hello &lt;world&gt; &amp; friends"));
        assert!(!xliff.contains("empty][0][value"));
    }

    #[test]
    fn import_routes_targets_by_item() {
        let content = r#"<?xml version="1.0" encoding="utf-8"?>
<xliff xmlns="urn:oasis:names:tc:xliff:document:1.2" version="1.2">
  <file original="job-7" source-language="en" target-language="fr" datatype="plaintext">
    <body>
      <group id="42">
        <trans-unit id="42][title][0][value" resname="title][0][value">
          <source>Hello</source>
          <target>Bonjour &amp; bienvenue</target>
        </trans-unit>
        <trans-unit id="42][body][0][value" resname="body][0][value">
          <source>Second field</source>
          <target>Deuxi&#232;me champ</target>
        </trans-unit>
        <trans-unit id="42][untranslated" resname="untranslated">
          <source>left alone</source>
          <target></target>
        </trans-unit>
      </group>
    </body>
  </file>
</xliff>"#;
        let imported = import(content).unwrap();
        let item = &imported[&42];
        // Entity and character references are folded back into the text
        assert_eq!(item["title][0][value"], "Bonjour & bienvenue");
        assert_eq!(item["body][0][value"], "Deuxième champ");
        assert!(!item.contains_key("untranslated"));
    }

    #[test]
    fn import_rejects_non_xliff_payload() {
        assert!(matches!(import("<html>error page</html>"), Err(Error::Parse(_))));
        assert!(matches!(import("not xml at all <"), Err(Error::Parse(_))));
    }

    #[test]
    fn export_import_is_stable() {
        let job = sample_job();
        let item = sample_item();
        let exported = export(&job, &item).unwrap();
        // A vendor returning the file untouched yields no targets
        let imported = import(&exported).unwrap();
        assert!(imported.get(&42).is_none());
    }

    #[test]
    fn unflatten_builds_nested_structure() {
        let mut flat = BTreeMap::new();
        flat.insert("title][0][value".to_string(), "Bonjour".to_string());
        flat.insert("body][0][value".to_string(), "Texte".to_string());
        let nested = unflatten(&flat);
        assert_eq!(nested["title"]["0"]["value"], json!("Bonjour"));
        assert_eq!(nested["body"]["0"]["value"], json!("Texte"));
    }
}
