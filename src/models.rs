use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

// ---------- Datasets ----------

/// The two uploads a problem definition is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetKind {
    Salas,
    Horarios,
}

impl DatasetKind {
    pub const ALL: [DatasetKind; 2] = [DatasetKind::Salas, DatasetKind::Horarios];

    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetKind::Salas => "salas",
            DatasetKind::Horarios => "horarios",
        }
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatasetKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "salas" => Ok(DatasetKind::Salas),
            "horarios" | "horários" => Ok(DatasetKind::Horarios),
            other => Err(other.to_string()),
        }
    }
}

/// Records read from a CSV file. Every record carries exactly the header's
/// columns, in header order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatasetTable {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl DatasetTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Append a record. Missing trailing values become empty strings and
    /// surplus values are dropped, so the column set stays uniform.
    pub fn push_row(&mut self, mut values: Vec<String>) {
        values.resize(self.columns.len(), String::new());
        self.rows.push(values);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn record(&self, index: usize) -> Option<Record<'_>> {
        self.rows.get(index).map(|values| Record {
            columns: &self.columns,
            values,
        })
    }

    pub fn records(&self) -> impl Iterator<Item = Record<'_>> + '_ {
        self.rows.iter().map(move |values| Record {
            columns: &self.columns,
            values,
        })
    }
}

impl Serialize for DatasetTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.records())
    }
}

/// Borrowed view of one dataset row.
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    columns: &'a [String],
    values: &'a [String],
}

impl<'a> Record<'a> {
    pub fn get(&self, column: &str) -> Option<&'a str> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|i| self.values[i].as_str())
    }

    pub fn values(&self) -> &'a [String] {
        self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
        let columns = self.columns;
        let values = self.values;
        columns
            .iter()
            .zip(values.iter())
            .map(|(c, v)| (c.as_str(), v.as_str()))
    }
}

impl Serialize for Record<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (column, value) in self.iter() {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

// ---------- Problem definition rows ----------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum VariableType {
    #[default]
    #[serde(rename = "discreto", alias = "discrete")]
    Discrete,
    #[serde(rename = "contínuo", alias = "continuo", alias = "continuous")]
    Continuous,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sense {
    #[default]
    #[serde(rename = "minimizar", alias = "minimize")]
    Minimize,
    #[serde(rename = "maximizar", alias = "maximize")]
    Maximize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionVariable {
    pub label: String,
    #[serde(rename = "type", default)]
    pub kind: VariableType,
    /// Bounds or allowed values, passed to the solver verbatim.
    #[serde(default)]
    pub range: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Objective {
    #[serde(default)]
    pub sense: Sense,
    #[serde(default)]
    pub expression: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintRow {
    #[serde(default)]
    pub expression: String,
}

// ---------- Problem document ----------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasetBundle {
    pub salas: DatasetTable,
    pub horarios: DatasetTable,
}

/// The JSON body of `POST /problem`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProblemDocument {
    pub problem_name: String,
    pub description: String,
    pub dataset: DatasetBundle,
    pub decision_variables: Vec<DecisionVariable>,
    pub objectives: Vec<Objective>,
    pub constraints: Vec<String>,
}

pub const DEFAULT_PROBLEM_NAME: &str = "UCTP - Atribuição de Salas a Aulas";
pub const DEFAULT_PROBLEM_DESCRIPTION: &str = "Problema de otimização multiobjetivo";

/// Name and description stamped on every submitted document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProblemMeta {
    pub name: String,
    pub description: String,
}

impl Default for ProblemMeta {
    fn default() -> Self {
        Self {
            name: DEFAULT_PROBLEM_NAME.to_string(),
            description: DEFAULT_PROBLEM_DESCRIPTION.to_string(),
        }
    }
}

// ---------- Solver responses ----------

/// Acknowledgement of `POST /problem`. The solver may omit any field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemAck {
    pub message: Option<String>,
    pub num_salas: Option<usize>,
    pub num_aulas: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub aula: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub sala: String,
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Metrics arrive as whatever the solver's JSON library produced: numbers,
/// numeric strings or null. Anything that is not a number reads as absent.
fn lenient_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().replace(',', ".").parse().ok(),
        serde_json::Value::Bool(b) => Some(if b { 1.0 } else { 0.0 }),
        _ => None,
    })
}

/// Raw body of `POST /solve`.
///
/// Older solver builds send the assignment list as `Atribuições` and report
/// the score as `objective`; both are folded into the canonical fields by
/// [`SolveOutcome::from`]. When both lists are present the legacy one wins.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolveResponse {
    pub error: Option<String>,
    #[serde(rename = "Atribuições")]
    pub legacy_assignments: Option<Vec<Assignment>>,
    pub assignments: Option<Vec<Assignment>>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub score: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub obj_value: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub penalty: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub num_penal: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub objective: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub score: f64,
    pub obj_value: f64,
    pub penalty: f64,
    pub num_penal: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SolveReport {
    pub assignments: Vec<Assignment>,
    pub metrics: Metrics,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SolveOutcome {
    Failed { error: String },
    Solved(SolveReport),
}

impl From<SolveResponse> for SolveOutcome {
    fn from(r: SolveResponse) -> Self {
        if let Some(error) = r.error.filter(|e| !e.is_empty()) {
            return SolveOutcome::Failed { error };
        }

        SolveOutcome::Solved(SolveReport {
            assignments: r.legacy_assignments.or(r.assignments).unwrap_or_default(),
            metrics: Metrics {
                score: r.score.or(r.objective).unwrap_or(0.0),
                obj_value: r.obj_value.unwrap_or(0.0),
                penalty: r.penalty.unwrap_or(0.0),
                num_penal: r.num_penal.unwrap_or(0.0),
            },
        })
    }
}
