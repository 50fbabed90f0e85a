//! Dictionary spec compiler
//!
//! Turns a list of column definitions into a [`DictionarySpec`] naming the
//! id, tag and value columns, and splits raw dictionary lines into columns.

use gazette_core::{FieldDefinition, GazetteError, Result, RowId};
use serde::{Deserialize, Serialize};

/// Position and role of one dictionary column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub column_index: usize,
    pub delimiter: Option<String>,
    pub is_tag: bool,
    pub is_value: bool,
}

/// Compiled column layout of a dictionary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DictionarySpec {
    /// Included fields in column order
    pub fields: Vec<(String, FieldSpec)>,
    pub id: FieldSpec,
    pub tag: Option<FieldSpec>,
    pub value: FieldSpec,
}

impl DictionarySpec {
    /// Compile field definitions.
    ///
    /// Excluded fields still occupy their column. Exactly one id field and one
    /// value field are required; at most one field may carry tags.
    pub fn compile(definitions: &[FieldDefinition]) -> Result<Self> {
        let mut fields = Vec::new();
        let mut id = None;
        let mut tag = None;
        let mut value = None;

        for (column_index, def) in definitions.iter().enumerate() {
            if !def.include {
                continue;
            }
            let spec = FieldSpec {
                column_index,
                delimiter: def.delimiter.clone().filter(|d| !d.is_empty()),
                is_tag: def.tag,
                is_value: def.value,
            };
            if def.id {
                set_once(&mut id, &spec, "id", &def.name)?;
            }
            if def.tag {
                set_once(&mut tag, &spec, "tag", &def.name)?;
            }
            if def.value {
                set_once(&mut value, &spec, "value", &def.name)?;
            }
            fields.push((def.name.clone(), spec));
        }

        let value = value.ok_or_else(|| {
            GazetteError::Configuration("dictionary has no value field".to_string())
        })?;
        let id = id.ok_or_else(|| {
            GazetteError::Configuration("dictionary has no id field".to_string())
        })?;

        Ok(Self {
            fields,
            id,
            tag,
            value,
        })
    }

    /// Columns a row must have
    pub fn required_columns(&self) -> usize {
        self.fields
            .iter()
            .map(|(_, f)| f.column_index + 1)
            .max()
            .unwrap_or(0)
    }

    /// Fields whose values go to the attribute store
    pub fn attribute_fields(&self) -> impl Iterator<Item = (&str, &FieldSpec)> {
        self.fields
            .iter()
            .filter(|(_, f)| !f.is_value)
            .map(|(name, f)| (name.as_str(), f))
    }

    /// Split a raw line into columns.
    ///
    /// Strips the line terminator, splits on `separator` and trims `enclosure`
    /// from both ends of each column.
    pub fn split_line(
        &self,
        row: RowId,
        line: &str,
        separator: char,
        enclosure: Option<char>,
    ) -> Result<Vec<String>> {
        let line = line.trim_end_matches(&['\n', '\r'][..]);
        let columns: Vec<String> = line
            .split(separator)
            .map(|c| match enclosure {
                Some(e) => c.trim_matches(e).to_string(),
                None => c.to_string(),
            })
            .collect();

        let required = self.required_columns();
        if columns.len() < required {
            return Err(GazetteError::Parse {
                row,
                message: format!("expected {} columns, found {}", required, columns.len()),
            });
        }
        Ok(columns)
    }
}

fn set_once(slot: &mut Option<FieldSpec>, spec: &FieldSpec, role: &str, name: &str) -> Result<()> {
    if slot.is_some() {
        return Err(GazetteError::Configuration(format!(
            "field '{name}' is a second {role} field"
        )));
    }
    *slot = Some(spec.clone());
    Ok(())
}
