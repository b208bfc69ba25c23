//! Data-model schemas and payload packaging.
//!
//! A [`Model`] is fetched at runtime from the model service and describes
//! how message elements map onto a named payload. Packaging is a pure
//! function of the elements and the schema.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Keyed payload forwarded to the ingestion services.
pub type Payload = Map<String, Value>;

/// Ordered field definitions for one account/model key.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Model {
    /// Machine name used in ingestion URLs.
    #[serde(default)]
    pub machine_name: String,
    /// Field definitions in schema order.
    #[serde(default)]
    pub fields: Vec<Field>,
}

/// Maps one message element onto a payload key.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    /// Key written into the payload.
    #[serde(default)]
    pub machine_name: String,
    /// Element index the value is read from.
    #[serde(default, rename = "idx")]
    pub index: usize,
    /// Whether the field is included at all.
    #[serde(default)]
    pub parse: bool,
    /// Optional group the key nests under.
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "empty_as_none")]
    pub group: Option<String>,
}

impl Field {
    /// A parsed, ungrouped field.
    pub fn new(index: usize, machine_name: impl Into<String>) -> Self {
        Self {
            machine_name: machine_name.into(),
            index,
            parse: true,
            group: None,
        }
    }

    /// Nest this field under `group`.
    #[must_use]
    pub fn in_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Exclude this field from packaging.
    #[must_use]
    pub fn skipped(mut self) -> Self {
        self.parse = false;
        self
    }
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let group = Option::<String>::deserialize(deserializer)?;
    Ok(group.filter(|g| !g.is_empty()))
}

/// Build a payload from message elements using `model`.
///
/// Fields are skipped when `parse` is false, when their index is past the
/// end of `elements`, or when the addressed element is empty. Grouped fields
/// nest under their group key; groups are written after ungrouped keys and
/// replace an ungrouped key of the same name. Values are carried as the
/// original text.
///
/// ```
/// use serde_json::json;
/// use trackwire::model::{Field, Model, package};
///
/// let model = Model {
///     machine_name: "tracker".into(),
///     fields: vec![
///         Field::new(0, "x"),
///         Field::new(1, "y").in_group("g"),
///         Field::new(2, "z").in_group("g"),
///     ],
/// };
/// let elements = ["A", "B", "C"].map(String::from);
/// let payload = package(&elements, &model);
/// assert_eq!(
///     serde_json::Value::Object(payload),
///     json!({"x": "A", "g": {"y": "B", "z": "C"}})
/// );
/// ```
#[must_use]
pub fn package(elements: &[String], model: &Model) -> Payload {
    let mut payload = Payload::new();
    let mut groups: BTreeMap<&str, Payload> = BTreeMap::new();

    for field in model.fields.iter().filter(|f| f.parse) {
        let Some(value) = elements.get(field.index).filter(|v| !v.is_empty()) else {
            continue;
        };
        let value = Value::String(value.clone());
        match field.group.as_deref() {
            Some(group) => {
                groups
                    .entry(group)
                    .or_default()
                    .insert(field.machine_name.clone(), value);
            }
            None => {
                payload.insert(field.machine_name.clone(), value);
            }
        }
    }

    for (group, members) in groups {
        payload.insert(group.to_owned(), Value::Object(members));
    }
    payload
}
