//! Payload parsing
//!
//! Explicit parse functions from untyped JSON payloads into typed records.
//! Every function returns `Result<_, ParseError>`; nothing here panics on a
//! malformed payload. Payloads may wrap their body in a `dados` object, which
//! is unwrapped transparently.

use chrono::NaiveDate;
use serde_json::{Map, Value};
use spendwatch_core::{
    ElectoralSummary, IdentityPatch, NormalizedRecord, ParseError, SourceKind, SpendCategory,
    SpendRecord, StaffStats, TrackedIdentity, TransparencySummary,
};

/// Field names of one feed's expense items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpenseFields {
    pub date: &'static str,
    pub category: &'static str,
    pub amount: &'static str,
    pub vendor: &'static str,
    pub document: &'static str,
}

/// Expense item layout of the lower-chamber API.
pub const CHAMBER_EXPENSE_FIELDS: ExpenseFields = ExpenseFields {
    date: "dataDocumento",
    category: "tipoDespesa",
    amount: "valorLiquido",
    vendor: "nomeFornecedor",
    document: "numDocumento",
};

/// Expense item layout of the upper-house API.
pub const SENATE_EXPENSE_FIELDS: ExpenseFields = ExpenseFields {
    date: "data",
    category: "tipoDespesa",
    amount: "valorReembolsado",
    vendor: "fornecedor",
    document: "documento",
};

// ============================================================================
// FEED PARSERS
// ============================================================================

/// Lower-chamber payload: expense list plus an optional spending ceiling.
pub fn chamber_records(
    payload: &Value,
    _identity: &TrackedIdentity,
) -> Result<Vec<NormalizedRecord>, ParseError> {
    let mut records: Vec<NormalizedRecord> =
        parse_expenses(payload, SourceKind::Chamber, &CHAMBER_EXPENSE_FIELDS)?
            .into_iter()
            .map(NormalizedRecord::Expense)
            .collect();
    if let Some(ceiling) = parse_spend_ceiling(payload)? {
        records.push(NormalizedRecord::SpendCeiling(ceiling));
    }
    Ok(records)
}

/// Upper-house payload: expenses, ceiling and staffing in one document.
///
/// Expected shape: `{"despesas": [...], "valorCota": n, "gabinete": {...}}`.
pub fn senate_records(
    payload: &Value,
    _identity: &TrackedIdentity,
) -> Result<Vec<NormalizedRecord>, ParseError> {
    let root = expect_object(unwrap_dados(payload), "senate payload")?;

    let mut records = Vec::new();
    if let Some(expenses) = root.get("despesas") {
        records.extend(
            parse_expenses(expenses, SourceKind::Senate, &SENATE_EXPENSE_FIELDS)?
                .into_iter()
                .map(NormalizedRecord::Expense),
        );
    }
    if let Some(ceiling) = optional_amount(root, "valorCota")? {
        records.push(NormalizedRecord::SpendCeiling(ceiling));
    }
    if let Some(office) = root.get("gabinete") {
        records.push(NormalizedRecord::Staffing(parse_staffing(
            office,
            SourceKind::Senate,
        )?));
    }
    Ok(records)
}

/// Electoral-authority payload.
pub fn electoral_records(
    payload: &Value,
    _identity: &TrackedIdentity,
) -> Result<Vec<NormalizedRecord>, ParseError> {
    if is_empty_payload(payload) {
        return Ok(Vec::new());
    }
    Ok(vec![NormalizedRecord::Electoral(parse_electoral(payload)?)])
}

/// Federal transparency payload.
pub fn transparency_records(
    payload: &Value,
    _identity: &TrackedIdentity,
) -> Result<Vec<NormalizedRecord>, ParseError> {
    if is_empty_payload(payload) {
        return Ok(Vec::new());
    }
    Ok(vec![NormalizedRecord::Transparency(parse_transparency(
        payload,
    )?)])
}

// ============================================================================
// RECORD PARSERS
// ============================================================================

/// Parse an expense list. Accepts a bare array or `{"dados": [...]}`.
pub fn parse_expenses(
    payload: &Value,
    source: SourceKind,
    fields: &ExpenseFields,
) -> Result<Vec<SpendRecord>, ParseError> {
    let items = unwrap_dados(payload)
        .as_array()
        .ok_or_else(|| unexpected("array of expenses", payload))?;

    items
        .iter()
        .map(|item| {
            let obj = expect_object(item, "expense item")?;
            Ok(SpendRecord {
                date: parse_date(require_str(obj, fields.date)?, fields.date)?,
                category: SpendCategory::from_label(require_str(obj, fields.category)?),
                amount: parse_amount(require(obj, fields.amount)?, fields.amount)?,
                vendor: optional_str(obj, fields.vendor).unwrap_or_default().to_string(),
                document_id: optional_str(obj, fields.document)
                    .filter(|s| !s.trim().is_empty())
                    .map(|s| s.trim().to_string()),
                source,
            })
        })
        .collect()
}

/// Spending ceiling from `valorCota`, if present.
pub fn parse_spend_ceiling(payload: &Value) -> Result<Option<f64>, ParseError> {
    match unwrap_dados(payload) {
        Value::Object(obj) => optional_amount(obj, "valorCota"),
        _ => Ok(None),
    }
}

pub fn parse_staffing(payload: &Value, source: SourceKind) -> Result<StaffStats, ParseError> {
    let obj = expect_object(unwrap_dados(payload), "staffing object")?;
    Ok(StaffStats {
        utilized_staff: parse_count(require(obj, "servidoresAtivos")?, "servidoresAtivos")?,
        max_staff: parse_count(require(obj, "limiteServidores")?, "limiteServidores")?,
        staff_cost: optional_amount(obj, "custoPessoal")?.unwrap_or(0.0),
        staff_cost_ceiling: optional_amount(obj, "tetoPessoal")?.unwrap_or(0.0),
        source: Some(source),
    })
}

pub fn parse_electoral(payload: &Value) -> Result<ElectoralSummary, ParseError> {
    let obj = expect_object(unwrap_dados(payload), "electoral object")?;
    let election_year = match obj.get("ano") {
        Some(v) if !v.is_null() => Some(parse_count(v, "ano")? as i32),
        _ => None,
    };
    Ok(ElectoralSummary {
        election_year,
        votes: match obj.get("votos") {
            Some(v) if !v.is_null() => parse_count(v, "votos")? as u64,
            _ => 0,
        },
        elected: obj.get("eleito").and_then(Value::as_bool).unwrap_or(false),
        campaign_spend: optional_amount(obj, "despesasCampanha")?.unwrap_or(0.0),
        campaign_donations: optional_amount(obj, "receitasCampanha")?.unwrap_or(0.0),
    })
}

pub fn parse_transparency(payload: &Value) -> Result<TransparencySummary, ParseError> {
    let obj = expect_object(unwrap_dados(payload), "transparency object")?;

    let sanctions = optional_array(obj, "sancoes")?;
    let contracts = optional_array(obj, "contratos")?;

    let mut contract_value = 0.0;
    for contract in contracts {
        let contract = expect_object(contract, "contract item")?;
        contract_value += optional_amount(contract, "valor")?.unwrap_or(0.0);
    }

    let notes = sanctions
        .iter()
        .filter_map(|s| s.get("descricao").and_then(Value::as_str))
        .map(str::to_string)
        .collect();

    Ok(TransparencySummary {
        sanctions: sanctions.len() as u32,
        public_contracts: contracts.len() as u32,
        contract_value,
        notes,
    })
}

pub fn parse_identity(payload: &Value) -> Result<IdentityPatch, ParseError> {
    let obj = expect_object(unwrap_dados(payload), "identity object")?;
    Ok(IdentityPatch {
        display_name: optional_str(obj, "nome").map(str::to_string),
        party: optional_str(obj, "siglaPartido").map(str::to_string),
        region: optional_str(obj, "siglaUf").map(str::to_string),
    })
}

// ============================================================================
// SCALAR PARSERS
// ============================================================================

/// Parse a monetary amount from a number or a string.
///
/// Strings may use `1234.56`, `1.234,56` or `1,234.56`. When both
/// separators appear, the last one is the decimal separator. A lone comma is
/// always decimal.
pub fn parse_amount(value: &Value, field: &str) -> Result<f64, ParseError> {
    let amount = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => normalize_amount(s.trim()).parse::<f64>().ok(),
        _ => None,
    };

    match amount {
        Some(a) if a.is_finite() => Ok(a),
        _ => Err(invalid(field, value, "expected a finite amount")),
    }
}

fn normalize_amount(raw: &str) -> String {
    match (raw.rfind(','), raw.rfind('.')) {
        (Some(comma), Some(dot)) if dot > comma => raw.replace(',', ""),
        (Some(_), _) => raw.replace('.', "").replace(',', "."),
        _ => raw.to_string(),
    }
}

/// Parse a date from `YYYY-MM-DD`, an ISO timestamp, or `DD/MM/YYYY`.
pub fn parse_date(raw: &str, field: &str) -> Result<NaiveDate, ParseError> {
    let trimmed = raw.trim();
    let iso = trimmed.get(..10).unwrap_or(trimmed);
    NaiveDate::parse_from_str(iso, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(trimmed, "%d/%m/%Y"))
        .map_err(|e| ParseError::InvalidValue {
            field: field.to_string(),
            value: raw.to_string(),
            reason: e.to_string(),
        })
}

fn parse_count(value: &Value, field: &str) -> Result<u32, ParseError> {
    let count = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    count
        .and_then(|c| u32::try_from(c).ok())
        .ok_or_else(|| invalid(field, value, "expected a non-negative integer"))
}

// ============================================================================
// HELPERS
// ============================================================================

fn unwrap_dados(payload: &Value) -> &Value {
    payload.get("dados").unwrap_or(payload)
}

fn is_empty_payload(payload: &Value) -> bool {
    match unwrap_dados(payload) {
        Value::Null => true,
        Value::Object(obj) => obj.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

fn expect_object<'a>(value: &'a Value, what: &str) -> Result<&'a Map<String, Value>, ParseError> {
    value.as_object().ok_or_else(|| unexpected(what, value))
}

fn require<'a>(obj: &'a Map<String, Value>, field: &str) -> Result<&'a Value, ParseError> {
    match obj.get(field) {
        Some(Value::Null) | None => Err(ParseError::MissingField {
            field: field.to_string(),
        }),
        Some(v) => Ok(v),
    }
}

fn require_str<'a>(obj: &'a Map<String, Value>, field: &str) -> Result<&'a str, ParseError> {
    let value = require(obj, field)?;
    value
        .as_str()
        .ok_or_else(|| invalid(field, value, "expected a string"))
}

fn optional_str<'a>(obj: &'a Map<String, Value>, field: &str) -> Option<&'a str> {
    obj.get(field).and_then(Value::as_str)
}

fn optional_amount(obj: &Map<String, Value>, field: &str) -> Result<Option<f64>, ParseError> {
    match obj.get(field) {
        Some(Value::Null) | None => Ok(None),
        Some(v) => parse_amount(v, field).map(Some),
    }
}

fn optional_array<'a>(
    obj: &'a Map<String, Value>,
    field: &str,
) -> Result<&'a [Value], ParseError> {
    match obj.get(field) {
        Some(Value::Null) | None => Ok(&[]),
        Some(Value::Array(items)) => Ok(items),
        Some(other) => Err(unexpected(&format!("array for {}", field), other)),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn unexpected(expected: &str, found: &Value) -> ParseError {
    ParseError::UnexpectedShape {
        expected: expected.to_string(),
        found: value_kind(found).to_string(),
    }
}

fn invalid(field: &str, value: &Value, reason: &str) -> ParseError {
    ParseError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
