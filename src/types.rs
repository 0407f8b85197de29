use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::error::{FormError, FormResult};

//==============================================================================
// Cell values and styles
//==============================================================================

/// A single spreadsheet value, typed at the grid boundary.
///
/// `Blank` is written to JSON as `""` so persisted rows stay blank-coalesced.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Blank,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl CellValue {
    /// Render the value the way a spreadsheet user reads it (`1.0` → `"1"`).
    pub fn as_text(&self) -> String {
        match self {
            CellValue::Blank => String::new(),
            CellValue::Text(s) => s.clone(),
            CellValue::Number(n) => format_number(*n),
            CellValue::Bool(b) => b.to_string(),
        }
    }

    /// True when the value renders to nothing but whitespace.
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Blank => true,
            CellValue::Text(s) => s.trim().is_empty(),
            CellValue::Number(_) | CellValue::Bool(_) => false,
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        if s.is_empty() {
            CellValue::Blank
        } else {
            CellValue::Text(s.to_string())
        }
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CellValue::Blank => serializer.serialize_str(""),
            CellValue::Text(s) => serializer.serialize_str(s),
            CellValue::Number(n) if n.fract() == 0.0 && n.abs() < 9.0e15 => {
                serializer.serialize_i64(*n as i64)
            }
            CellValue::Number(n) => serializer.serialize_f64(*n),
            CellValue::Bool(b) => serializer.serialize_bool(*b),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawCellValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl<'de> Deserialize<'de> for CellValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match RawCellValue::deserialize(deserializer)? {
            RawCellValue::Null => CellValue::Blank,
            RawCellValue::Bool(b) => CellValue::Bool(b),
            RawCellValue::Number(n) => CellValue::Number(n),
            RawCellValue::Text(s) => CellValue::from(s.as_str()),
        })
    }
}

/// Fill portion of a cell style (`<patternFill>`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FillStyle {
    /// `patternType` attribute, e.g. `solid` or `none`.
    pub pattern: Option<String>,
    pub has_foreground: bool,
    pub has_background: bool,
}

impl FillStyle {
    /// A fill counts when its pattern is anything but `none`, or it carries a color.
    pub fn is_filled(&self) -> bool {
        match self.pattern.as_deref() {
            Some(p) if p.eq_ignore_ascii_case("none") => false,
            Some(_) => true,
            None => self.has_foreground || self.has_background,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FontStyle {
    pub italic: bool,
}

/// Resolved style of one cell.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CellStyle {
    pub fill: Option<FillStyle>,
    pub font: FontStyle,
}

impl CellStyle {
    pub fn italic() -> Self {
        Self {
            fill: None,
            font: FontStyle { italic: true },
        }
    }

    pub fn solid_fill() -> Self {
        Self {
            fill: Some(FillStyle {
                pattern: Some("solid".to_string()),
                has_foreground: true,
                has_background: false,
            }),
            font: FontStyle::default(),
        }
    }

    pub fn is_filled(&self) -> bool {
        self.fill.as_ref().is_some_and(FillStyle::is_filled)
    }
}

//==============================================================================
// Parsed table
//==============================================================================

/// One emitted cell: its value and whether an employee fills it in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableCell {
    pub value: CellValue,
    #[serde(rename = "isInput")]
    pub is_input: bool,
}

impl TableCell {
    pub fn fixed(value: CellValue) -> Self {
        Self {
            value,
            is_input: false,
        }
    }
}

/// Which ingestion path produced a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParseMode {
    /// `STT` in column 0 and `Chỉ tiêu` in column 1.
    Strict,
    /// Role phrases anywhere on one row.
    Flexible,
    /// No header found; row 0 used verbatim.
    FullSheet,
    /// The workbook had no sheet to read.
    Error,
}

impl fmt::Display for ParseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ParseMode::Strict => "strict",
            ParseMode::Flexible => "flexible",
            ParseMode::FullSheet => "full-sheet",
            ParseMode::Error => "error",
        };
        f.write_str(s)
    }
}

/// Column indices resolved for each semantic role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnRoles {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub planned: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_score: Option<usize>,
}

/// Diagnostics attached to every parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseMeta {
    pub mode: ParseMode,
    /// 0-based sheet row of the effective header row.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header_row: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns: Option<ColumnRoles>,
    pub input_policy: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sheet_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Output of the ingestion pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<TableCell>>,
    pub meta: ParseMeta,
}

impl ParsedTable {
    /// Table returned when the workbook has no readable sheet.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            headers: Vec::new(),
            rows: Vec::new(),
            meta: ParseMeta {
                mode: ParseMode::Error,
                header_row: None,
                columns: None,
                input_policy: "none".to_string(),
                sheet_name: None,
                message: Some(message.into()),
            },
        }
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty() || self.rows.is_empty()
    }

    pub fn input_cell_count(&self) -> usize {
        self.rows
            .iter()
            .flat_map(|row| row.iter())
            .filter(|cell| cell.is_input)
            .count()
    }
}

//==============================================================================
// Templates
//==============================================================================

/// Composite template key `branch|department|position`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TemplateKey {
    pub branch_id: String,
    pub department_id: String,
    pub position_id: String,
}

impl TemplateKey {
    pub const SEPARATOR: char = '|';

    pub fn new(
        branch_id: impl Into<String>,
        department_id: impl Into<String>,
        position_id: impl Into<String>,
    ) -> FormResult<Self> {
        let key = Self {
            branch_id: branch_id.into().trim().to_string(),
            department_id: department_id.into().trim().to_string(),
            position_id: position_id.into().trim().to_string(),
        };
        for (field, value) in [
            ("branchId", &key.branch_id),
            ("departmentId", &key.department_id),
            ("positionId", &key.position_id),
        ] {
            if value.is_empty() {
                return Err(FormError::MissingRequiredField(field.to_string()));
            }
            if value.contains(Self::SEPARATOR) {
                return Err(FormError::InvalidKey(format!(
                    "{field} must not contain '{}'",
                    Self::SEPARATOR
                )));
            }
        }
        Ok(key)
    }

    /// Parse `"b1|d1|p1"`.
    pub fn parse(raw: &str) -> FormResult<Self> {
        let parts: Vec<&str> = raw.split(Self::SEPARATOR).collect();
        match parts.as_slice() {
            [branch, department, position] => Self::new(*branch, *department, *position)
                .map_err(|e| FormError::InvalidKey(format!("'{raw}': {e}"))),
            _ => Err(FormError::InvalidKey(format!(
                "'{raw}' must have the form branchId|departmentId|positionId"
            ))),
        }
    }
}

impl fmt::Display for TemplateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{sep}{}{sep}{}",
            self.branch_id,
            self.department_id,
            self.position_id,
            sep = Self::SEPARATOR
        )
    }
}

/// Persisted template record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub key: String,
    pub branch_id: String,
    pub department_id: String,
    pub position_id: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<TableCell>>,
    pub source_file: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Everything an upsert writes; timestamps are assigned by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateDraft {
    pub key: TemplateKey,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<TableCell>>,
    pub source_file: Option<String>,
}

impl TemplateDraft {
    pub fn from_table(key: TemplateKey, table: &ParsedTable, source_file: Option<String>) -> Self {
        Self {
            key,
            headers: table.headers.clone(),
            rows: table.rows.clone(),
            source_file,
        }
    }

    /// Build the record for a first insert.
    pub fn into_template(self, created_at: DateTime<Utc>, updated_at: DateTime<Utc>) -> Template {
        Template {
            key: self.key.to_string(),
            branch_id: self.key.branch_id,
            department_id: self.key.department_id,
            position_id: self.key.position_id,
            headers: self.headers,
            rows: self.rows,
            source_file: self.source_file,
            created_at,
            updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_value_as_text() {
        assert_eq!(CellValue::Number(1.0).as_text(), "1");
        assert_eq!(CellValue::Number(2.5).as_text(), "2.5");
        assert_eq!(CellValue::Text("Mục tiêu".to_string()).as_text(), "Mục tiêu");
        assert_eq!(CellValue::Blank.as_text(), "");
    }

    #[test]
    fn test_cell_value_blank_detection() {
        assert!(CellValue::Blank.is_blank());
        assert!(CellValue::Text("   ".to_string()).is_blank());
        assert!(!CellValue::Number(0.0).is_blank());
    }

    #[test]
    fn test_cell_value_json_shape() {
        let cells = vec![
            TableCell::fixed(CellValue::Blank),
            TableCell::fixed(CellValue::Number(100.0)),
            TableCell {
                value: CellValue::Text("x".to_string()),
                is_input: true,
            },
        ];
        let json = serde_json::to_string(&cells).unwrap();
        assert_eq!(
            json,
            r#"[{"value":"","isInput":false},{"value":100,"isInput":false},{"value":"x","isInput":true}]"#
        );

        let back: Vec<TableCell> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cells);
    }

    #[test]
    fn test_cell_value_null_reads_as_blank() {
        let cell: TableCell = serde_json::from_str(r#"{"value":null,"isInput":false}"#).unwrap();
        assert_eq!(cell.value, CellValue::Blank);
    }

    #[test]
    fn test_fill_style_detection() {
        let none = FillStyle {
            pattern: Some("none".to_string()),
            has_foreground: true,
            has_background: false,
        };
        assert!(!none.is_filled());
        assert!(CellStyle::solid_fill().is_filled());
        assert!(!CellStyle::italic().is_filled());

        let color_only = FillStyle {
            pattern: None,
            has_foreground: false,
            has_background: true,
        };
        assert!(color_only.is_filled());
    }

    #[test]
    fn test_template_key_round_trip() {
        let key = TemplateKey::parse("b1|d1|p1").unwrap();
        assert_eq!(key.branch_id, "b1");
        assert_eq!(key.department_id, "d1");
        assert_eq!(key.position_id, "p1");
        assert_eq!(key.to_string(), "b1|d1|p1");
    }

    #[test]
    fn test_template_key_rejects_bad_input() {
        assert!(TemplateKey::parse("b1|d1").is_err());
        assert!(TemplateKey::parse("b1||p1").is_err());
        assert!(TemplateKey::parse("b1|d1|p1|x").is_err());
        assert!(matches!(
            TemplateKey::new("b|1", "d1", "p1"),
            Err(FormError::InvalidKey(_))
        ));
        assert!(matches!(
            TemplateKey::new("", "d1", "p1"),
            Err(FormError::MissingRequiredField(_))
        ));
    }

    #[test]
    fn test_template_serializes_camel_case() {
        let now = Utc::now();
        let draft = TemplateDraft {
            key: TemplateKey::parse("b1|d1|p1").unwrap(),
            headers: vec!["STT".to_string()],
            rows: vec![vec![TableCell::fixed(CellValue::Number(1.0))]],
            source_file: Some("form.xlsx".to_string()),
        };
        let template = draft.into_template(now, now);
        let json = serde_json::to_value(&template).unwrap();
        assert_eq!(json["key"], "b1|d1|p1");
        assert_eq!(json["branchId"], "b1");
        assert_eq!(json["sourceFile"], "form.xlsx");
        assert!(json.get("createdAt").is_some());
        assert!(json.get("updatedAt").is_some());
    }
}
