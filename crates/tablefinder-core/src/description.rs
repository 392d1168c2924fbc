//! Canonical table descriptions for embedding.
//!
//! [`describe`] turns catalog metadata (plus an optional data sample) into
//! one text blob per table. The blob is made of fixed segments joined by
//! [`SEPARATOR`], so an embedding model can still see where one kind of
//! information ends and the next begins:
//!
//! | # | Segment | Present when |
//! |---|---------|--------------|
//! | 1 | business purpose | always |
//! | 2 | column semantics | some column matches a group |
//! | 3 | sample examples and characteristics | a sample is supplied |
//! | 4 | relationships | the table has foreign keys |
//! | 5 | key fields | PK, required or lookup columns exist |
//! | 6 | volume bucket | row count is known and non-zero |
//! | 7 | search terms | always |
//!
//! Keyword lists carry both English and Spanish stems since catalogs in
//! the wild use either.
//!
//! The function is pure and deterministic and never fails; missing inputs
//! simply drop their segment.

use serde_json::Value;

use crate::models::{ColumnMeta, SampleRows, TableMetadata};

/// Separator placed between segments.
pub const SEPARATOR: &str = " | ";

/// Never read more sample rows than this.
pub const MAX_SAMPLE_ROWS: usize = 10;
const MAX_SAMPLE_COLUMNS: usize = 8;
const MAX_SAMPLE_EXAMPLES: usize = 6;
const MAX_RELATIONSHIPS: usize = 8;
const MAX_PRIMARY_KEYS: usize = 3;
const MAX_REQUIRED: usize = 6;
const MAX_LOOKUP: usize = 4;
const MAX_SEARCH_TERMS: usize = 25;

const ID_HINTS: &[&str] = &["_id", "code", "codigo", "cve_", "clave"];
const MONEY_HINTS: &[&str] = &[
    "price", "amount", "cost", "total", "precio", "importe", "costo", "monto",
];
const QUANTITY_HINTS: &[&str] = &[
    "quantity", "qty", "units", "stock", "cantidad", "unidades", "existencia",
];
const DATE_HINTS: &[&str] = &["date", "fecha", "timestamp", "hora"];
const PERSON_HINTS: &[&str] = &[
    "customer", "supplier", "employee", "user", "cliente", "proveedor", "empleado", "vendedor",
    "usuario",
];
const NAME_HINTS: &[&str] = &["name", "desc", "nombre", "descripcion"];
const STATUS_HINTS: &[&str] = &["status", "estatus", "active", "activo"];
const LOOKUP_HINTS: &[&str] = &["code", "codigo", "cve_", "folio", "number", "numero"];
const AUDIT_HINTS: &[&str] = &[
    "created", "updated", "modified", "creado", "modificado", "usuario",
];
const DETAIL_HINTS: &[&str] = &["det", "detail", "line", "linea"];
const HEADER_HINTS: &[&str] = &["header", "encab", "docto", "document"];

/// Business purpose inferred from a table name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    Sales,
    Customer,
    Product,
    Inventory,
    Purchasing,
    Supplier,
    Employee,
    Payments,
    Classification,
    Configuration,
}

/// Rules are tried in order; the first one whose hint appears in the
/// lowercased table name wins.
const PURPOSE_RULES: &[(Purpose, &[&str])] = &[
    (
        Purpose::Sales,
        &["sale", "invoice", "ticket", "venta", "factura", "doctos_pv", "doctos_ve"],
    ),
    (Purpose::Customer, &["customer", "client"]),
    (Purpose::Product, &["product", "article", "item", "articulo", "producto"]),
    (Purpose::Inventory, &["inventory", "stock", "inventario", "existencia"]),
    (Purpose::Purchasing, &["purchase", "compra"]),
    (Purpose::Supplier, &["supplier", "vendor", "proveedor"]),
    (Purpose::Employee, &["employee", "staff", "empleado", "personal", "vendedor"]),
    (Purpose::Payments, &["payment", "pago", "cobranza", "abono"]),
    (
        Purpose::Classification,
        &[
            "category", "group", "family", "brand", "type", "categoria", "grupo", "familia",
            "linea", "marca", "tipo",
        ],
    ),
    (Purpose::Configuration, &["config", "setting", "param"]),
];

impl Purpose {
    pub fn infer(table_name: &str) -> Option<Purpose> {
        let name = table_name.to_lowercase();
        PURPOSE_RULES
            .iter()
            .find(|(_, hints)| contains_any(&name, hints))
            .map(|(purpose, _)| *purpose)
    }

    fn synonyms(self) -> &'static [&'static str] {
        match self {
            Purpose::Sales => &[
                "sell", "sold", "transaction", "revenue", "ticket", "invoice", "billing",
            ],
            Purpose::Customer => &["buyer", "consumer", "client", "account"],
            Purpose::Product => &[
                "product", "merchandise", "item", "sku", "inventory", "available",
            ],
            Purpose::Inventory => &["stock", "on hand", "warehouse", "available"],
            Purpose::Purchasing => &["acquisition", "purchase order", "procurement", "sourcing"],
            Purpose::Supplier => &["vendor", "supplier", "distributor", "provider"],
            Purpose::Employee => &["worker", "staff", "personnel", "salesperson"],
            Purpose::Payments => &["installment", "collection", "settlement", "receivable"],
            Purpose::Classification => &["category", "group", "classification", "family"],
            Purpose::Configuration => &["settings", "parameters", "options"],
        }
    }
}

/// Build the canonical description of a table.
///
/// At most [`MAX_SAMPLE_ROWS`] rows of `sample` are read.
pub fn describe(meta: &TableMetadata, sample: Option<&SampleRows>) -> String {
    let mut segments: Vec<String> = Vec::new();

    segments.push(business_purpose(meta));
    segments.extend(column_semantics(&meta.columns));
    if let Some(sample) = sample.filter(|s| !s.is_empty()) {
        segments.extend(sample_examples(&meta.columns, sample));
        segments.extend(sample_characteristics(&meta.columns, sample));
    }
    segments.extend(relationships(meta));
    segments.extend(key_fields(meta));
    segments.extend(volume(meta.row_count));
    segments.push(search_terms(meta));

    segments.join(SEPARATOR)
}

fn contains_any(haystack: &str, hints: &[&str]) -> bool {
    hints.iter().any(|h| haystack.contains(h))
}

fn column_matches(col: &ColumnMeta, hints: &[&str]) -> bool {
    contains_any(&col.name.to_lowercase(), hints)
}

fn any_column(columns: &[ColumnMeta], hints: &[&str]) -> bool {
    columns.iter().any(|c| column_matches(c, hints))
}

fn business_purpose(meta: &TableMetadata) -> String {
    let name = meta.name.to_lowercase();
    let cols = &meta.columns;
    let mut parts: Vec<&str> = Vec::new();

    match Purpose::infer(&meta.name) {
        Some(Purpose::Sales) => {
            if any_column(cols, MONEY_HINTS) || any_column(cols, QUANTITY_HINTS) {
                parts.push("sales transactions");
                if contains_any(&name, DETAIL_HINTS) {
                    parts.push("line items sold in each operation");
                } else {
                    parts.push("sales document headers with customer, date and totals");
                }
            }
        }
        Some(Purpose::Customer) => {
            parts.push("customer master records");
            if any_column(cols, &["address", "direccion", "domicilio"]) {
                parts.push("includes contact and location data");
            }
        }
        Some(Purpose::Product) => {
            parts.push("product catalog of items sold");
            if any_column(cols, &["price", "precio"]) {
                parts.push("with prices and sale attributes");
            }
            if any_column(cols, &["stock", "existencia"]) {
                parts.push("with stock on hand");
            }
        }
        Some(Purpose::Inventory) => {
            parts.push("inventory quantities by warehouse");
            if contains_any(&name, &["movement", "movimiento", "movto"]) {
                parts.push("stock movements in and out");
            }
        }
        Some(Purpose::Purchasing) => {
            parts.push("purchasing and procurement");
            if any_column(cols, &["supplier", "vendor", "proveedor"]) {
                parts.push("orders linked to suppliers");
            }
        }
        Some(Purpose::Supplier) => parts.push("supplier master records"),
        Some(Purpose::Employee) => parts.push("employee and staff records"),
        Some(Purpose::Payments) => {
            parts.push("payments and collections");
            if any_column(cols, &["balance", "saldo"]) {
                parts.push("tracks balances and debts");
            }
        }
        Some(Purpose::Classification) => parts.push("classification catalog"),
        Some(Purpose::Configuration) => parts.push("system configuration and parameters"),
        None => {}
    }

    if parts.is_empty() {
        if any_column(cols, DATE_HINTS) && any_column(cols, MONEY_HINTS) {
            return "transactional records with dates and amounts".to_string();
        }
        if any_column(cols, NAME_HINTS) {
            return "catalog or master data".to_string();
        }
        return format!("table {}", meta.name);
    }
    parts.join(". ")
}

fn column_semantics(columns: &[ColumnMeta]) -> Option<String> {
    let groups: [(&str, &[&str], usize); 6] = [
        ("identifiers", ID_HINTS, 5),
        ("monetary", MONEY_HINTS, 5),
        ("quantities", QUANTITY_HINTS, 3),
        ("dates", DATE_HINTS, 3),
        ("people", PERSON_HINTS, 3),
        ("descriptive", NAME_HINTS, 3),
    ];
    let mut out: Vec<String> = Vec::new();
    for (label, hints, cap) in groups {
        let names: Vec<&str> = columns
            .iter()
            .filter(|c| column_matches(c, hints))
            .take(cap)
            .map(|c| c.name.as_str())
            .collect();
        if !names.is_empty() {
            out.push(format!("{}: {}", label, names.join(", ")));
        }
    }
    (!out.is_empty()).then(|| out.join("; "))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueKind {
    Date,
    Numeric,
    Text,
    Other,
}

fn value_kind(data_type: &str) -> ValueKind {
    let t = data_type.to_uppercase();
    if t.contains("DATE") || t.contains("TIME") {
        ValueKind::Date
    } else if ["INT", "DEC", "NUM", "REAL", "FLOAT", "DOUBLE", "MONEY"]
        .iter()
        .any(|k| t.contains(k))
    {
        ValueKind::Numeric
    } else if ["CHAR", "TEXT", "STRING", "CLOB"].iter().any(|k| t.contains(k)) {
        ValueKind::Text
    } else {
        ValueKind::Other
    }
}

fn value_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn value_number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Non-null sample values of `column`, from at most [`MAX_SAMPLE_ROWS`] rows.
fn sampled<'a>(sample: &'a SampleRows, column: &str) -> Vec<&'a Value> {
    let Some(idx) = sample.position(column) else {
        return Vec::new();
    };
    sample
        .rows
        .iter()
        .take(MAX_SAMPLE_ROWS)
        .filter_map(|row| row.get(idx))
        .filter(|v| !v.is_null())
        .collect()
}

fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}

fn sample_examples(columns: &[ColumnMeta], sample: &SampleRows) -> Option<String> {
    let mut out: Vec<String> = Vec::new();
    for col in columns.iter().take(MAX_SAMPLE_COLUMNS) {
        let values = sampled(sample, &col.name);
        if values.is_empty() {
            continue;
        }
        match value_kind(&col.data_type) {
            ValueKind::Text => {
                let mut distinct: Vec<String> = Vec::new();
                for v in &values {
                    let text = value_text(v);
                    if !distinct.contains(&text) {
                        distinct.push(text);
                    }
                }
                if distinct.len() <= 5 && distinct.iter().all(|v| v.chars().count() < 50) {
                    out.push(format!("{}: \"{}\"", col.name, distinct.join(", ")));
                } else if let Some(first) = distinct.first().filter(|f| !f.is_empty()) {
                    out.push(format!("{} e.g. \"{}\"", col.name, truncate_chars(first, 40)));
                }
            }
            ValueKind::Numeric => {
                let nums: Vec<f64> = values.iter().filter_map(|v| value_number(v)).collect();
                if nums.is_empty() {
                    continue;
                }
                let min = nums.iter().copied().fold(f64::INFINITY, f64::min);
                let max = nums.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                if min == max {
                    out.push(format!("{}: {}", col.name, min));
                } else {
                    out.push(format!("{}: range {:.2} to {:.2}", col.name, min, max));
                }
            }
            ValueKind::Date => {
                let first = truncate_chars(&value_text(values[0]), 10).to_string();
                let last = truncate_chars(&value_text(values[values.len() - 1]), 10).to_string();
                if first == last {
                    out.push(format!("{}: {}", col.name, first));
                } else {
                    out.push(format!("{}: from {} to {}", col.name, first, last));
                }
            }
            ValueKind::Other => {}
        }
        if out.len() == MAX_SAMPLE_EXAMPLES {
            break;
        }
    }
    (!out.is_empty()).then(|| format!("examples: {}", out.join("; ")))
}

fn sample_characteristics(columns: &[ColumnMeta], sample: &SampleRows) -> Option<String> {
    let mut out: Vec<String> = Vec::new();

    for col in columns
        .iter()
        .filter(|c| value_kind(&c.data_type) == ValueKind::Date)
        .take(2)
    {
        let values = sampled(sample, &col.name);
        if let (Some(first), Some(last)) = (values.first(), values.last()) {
            let first = value_text(first);
            let last = value_text(last);
            let (fy, ly) = (truncate_chars(&first, 4), truncate_chars(&last, 4));
            if fy != ly {
                out.push(format!("records since {}", fy));
                break;
            }
        }
    }

    let sequential = columns
        .iter()
        .take(5)
        .filter(|c| contains_any(&c.name.to_lowercase(), &["id", "folio", "number", "numero"]))
        .any(|c| {
            let ids: Vec<i64> = sampled(sample, &c.name)
                .into_iter()
                .filter_map(|v| match v {
                    Value::Number(n) => n.as_i64(),
                    Value::String(s) => s.parse().ok(),
                    _ => None,
                })
                .collect();
            if ids.len() < 3 {
                return false;
            }
            let span = ids[ids.len() - 1].saturating_sub(ids[0]);
            let avg = span as f64 / (ids.len() - 1) as f64;
            avg > 0.0 && avg < 100.0
        });
    if sequential {
        out.push("sequential records".to_string());
    }

    let catalog = columns
        .iter()
        .take(3)
        .filter(|c| column_matches(c, NAME_HINTS))
        .any(|c| {
            let values: Vec<String> = sampled(sample, &c.name)
                .into_iter()
                .map(value_text)
                .filter(|v| !v.is_empty())
                .collect();
            let mut distinct = values.clone();
            distinct.sort();
            distinct.dedup();
            !values.is_empty() && distinct.len() == values.len()
        });
    if catalog {
        out.push("master catalog".to_string());
    }

    if columns.iter().filter(|c| column_matches(c, MONEY_HINTS)).count() >= 2 {
        out.push("financial management".to_string());
    }
    if any_column(columns, AUDIT_HINTS) {
        out.push("with audit fields".to_string());
    }

    (!out.is_empty()).then(|| format!("characteristics: {}", out.join("; ")))
}

fn business_name(column: &str, referenced_table: &str) -> String {
    let col = column.to_lowercase();
    let known: &[(&[&str], &str)] = &[
        (&["customer", "cliente"], "customers"),
        (&["product", "article", "item", "articulo", "producto"], "products"),
        (&["supplier", "vendor", "proveedor"], "suppliers"),
        (&["warehouse", "almacen"], "warehouses"),
        (&["employee", "seller", "empleado", "vendedor"], "employees"),
        (&["branch", "store", "sucursal"], "branches"),
        (&["doc", "docto", "documento"], "documents"),
    ];
    known
        .iter()
        .find(|(hints, _)| contains_any(&col, hints))
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| referenced_table.to_lowercase().replace('_', " "))
}

fn relationships(meta: &TableMetadata) -> Option<String> {
    let rels: Vec<String> = meta
        .foreign_keys
        .iter()
        .filter_map(|fk| {
            let col = fk.columns.first()?;
            let target = match fk.referenced_columns.first() {
                Some(ref_col) => format!("{}.{}", fk.referenced_table, ref_col),
                None => fk.referenced_table.clone(),
            };
            Some(format!(
                "{} → {} ({})",
                col,
                target,
                business_name(col, &fk.referenced_table)
            ))
        })
        .take(MAX_RELATIONSHIPS)
        .collect();
    (!rels.is_empty()).then(|| format!("relationships: {}", rels.join("; ")))
}

fn required_hint(column: &str) -> Option<&'static str> {
    let col = column.to_lowercase();
    if contains_any(&col, STATUS_HINTS) {
        Some("status")
    } else if contains_any(&col, &["cancel"]) {
        Some("cancellation")
    } else if contains_any(&col, NAME_HINTS) {
        Some("identification")
    } else if contains_any(&col, DATE_HINTS) {
        Some("temporal")
    } else if contains_any(&col, &["type", "tipo"]) {
        Some("classification")
    } else {
        None
    }
}

fn key_fields(meta: &TableMetadata) -> Option<String> {
    let mut out: Vec<String> = Vec::new();

    if !meta.primary_keys.is_empty() {
        let pks: Vec<String> = meta
            .primary_keys
            .iter()
            .take(MAX_PRIMARY_KEYS)
            .map(|pk| match meta.column(pk) {
                Some(col) => format!("{} ({})", pk, col.data_type),
                None => pk.clone(),
            })
            .collect();
        out.push(format!("primary key: {}", pks.join(", ")));
    }

    let required: Vec<String> = meta
        .columns
        .iter()
        .filter(|c| !c.nullable && !meta.primary_keys.contains(&c.name) && c.name.len() < 30)
        .take(MAX_REQUIRED)
        .map(|c| match required_hint(&c.name) {
            Some(hint) => format!("{} ({})", c.name, hint),
            None => c.name.clone(),
        })
        .collect();
    if !required.is_empty() {
        out.push(format!("required: {}", required.join(", ")));
    }

    let lookup: Vec<&str> = meta
        .columns
        .iter()
        .take(15)
        .filter(|c| column_matches(c, LOOKUP_HINTS))
        .map(|c| c.name.as_str())
        .collect();
    if !lookup.is_empty() && lookup.len() <= MAX_LOOKUP {
        out.push(format!("lookup by: {}", lookup.join(", ")));
    }

    (!out.is_empty()).then(|| out.join("; "))
}

/// `1234567` → `"1,234,567"`.
pub fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Volume bucket for a row count; `None` when unknown or zero.
pub fn volume_bucket(rows: Option<u64>) -> Option<&'static str> {
    match rows? {
        0 => None,
        r if r < 100 => Some("small catalog"),
        r if r < 1_000 => Some("medium catalog"),
        r if r < 10_000 => Some("moderate volume"),
        r if r < 100_000 => Some("high volume"),
        _ => Some("very high volume"),
    }
}

fn volume(rows: Option<u64>) -> Option<String> {
    let bucket = volume_bucket(rows)?;
    let rows = rows.unwrap_or_default();
    Some(format!("volume: {} ({} rows)", bucket, group_thousands(rows)))
}

fn search_terms(meta: &TableMetadata) -> String {
    let name = meta.name.to_lowercase();
    let cols = &meta.columns;
    let mut terms: Vec<&str> = Vec::new();
    let mut add = |words: &[&'static str]| {
        for &w in words {
            if !terms.contains(&w) {
                terms.push(w);
            }
        }
    };

    for (purpose, hints) in PURPOSE_RULES {
        if contains_any(&name, hints) {
            add(purpose.synonyms());
        }
    }
    if contains_any(&name, &["price", "precio"]) {
        add(&["cost", "amount", "value", "rate"]);
    }
    if contains_any(&name, &["order", "pedido"]) {
        add(&["order", "request", "requisition"]);
    }

    if any_column(cols, STATUS_HINTS) {
        add(&["active", "inactive", "current", "available"]);
    }
    if any_column(cols, DATE_HINTS) {
        add(&["temporal", "history", "chronological"]);
    }
    if any_column(cols, MONEY_HINTS) {
        add(&["financial", "monetary"]);
    }
    if any_column(cols, QUANTITY_HINTS) {
        add(&["volume", "count", "sum"]);
    }
    if contains_any(&name, DETAIL_HINTS) {
        add(&["line item", "item", "individual movement"]);
    }
    if contains_any(&name, HEADER_HINTS) {
        add(&["document", "header", "summary"]);
    }
    add(&["how many", "count", "total", "list", "show", "records"]);

    terms.truncate(MAX_SEARCH_TERMS);
    format!("search terms: {}", terms.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sales() -> TableMetadata {
        TableMetadata::new("SALES")
            .with_column("SALE_ID", "INTEGER", false)
            .with_column("CUSTOMER_ID", "INTEGER", false)
            .with_column("SALE_DATE", "DATE", false)
            .with_column("TOTAL_AMOUNT", "DECIMAL", true)
            .with_column("STATUS", "VARCHAR", false)
            .with_primary_key("SALE_ID")
            .with_foreign_key("CUSTOMER_ID", "CUSTOMERS", "CUSTOMER_ID")
            .with_row_count(25_000)
    }

    fn sample() -> SampleRows {
        let mut rows = Vec::new();
        for i in 0..15 {
            rows.push(vec![
                json!(100 + i),
                json!(7),
                json!(format!("2023-01-{:02}", i + 1)),
                json!(10.5 + i as f64),
                json!(if i % 2 == 0 { "OPEN" } else { "PAID" }),
            ]);
        }
        SampleRows {
            columns: vec![
                "SALE_ID".into(),
                "CUSTOMER_ID".into(),
                "SALE_DATE".into(),
                "TOTAL_AMOUNT".into(),
                "STATUS".into(),
            ],
            rows,
        }
    }

    #[test]
    fn test_segments_in_order() {
        let text = describe(&sales(), Some(&sample()));
        let segments: Vec<&str> = text.split(SEPARATOR).collect();

        assert!(segments[0].starts_with("sales transactions"));
        assert!(segments[1].starts_with("identifiers: SALE_ID, CUSTOMER_ID"));
        assert!(segments[2].starts_with("examples: "));
        assert!(segments[3].starts_with("characteristics: "));
        assert!(segments[4].starts_with("relationships: CUSTOMER_ID → CUSTOMERS.CUSTOMER_ID (customers)"));
        assert!(segments[5].starts_with("primary key: SALE_ID (INTEGER)"));
        assert_eq!(segments[6], "volume: high volume (25,000 rows)");
        assert!(segments[7].starts_with("search terms: "));
    }

    #[test]
    fn test_deterministic() {
        assert_eq!(
            describe(&sales(), Some(&sample())),
            describe(&sales(), Some(&sample()))
        );
    }

    #[test]
    fn test_sample_reads_at_most_ten_rows() {
        let text = describe(&sales(), Some(&sample()));
        // Rows 0..10 give ids 100..=109; row 14 would push the max to 114.
        assert!(text.contains("SALE_ID: range 100.00 to 109.00"), "{}", text);
        assert!(text.contains("SALE_DATE: from 2023-01-01 to 2023-01-10"));
        assert!(text.contains("STATUS: \"OPEN, PAID\""));
        assert!(text.contains("sequential records"));
        assert!(text.contains("CUSTOMER_ID: 7"));
    }

    #[test]
    fn test_missing_inputs_omit_segments() {
        let bare = TableMetadata::new("XYZ_0001");
        assert_eq!(
            describe(&bare, None),
            "table XYZ_0001 | search terms: how many, count, total, list, show, records"
        );

        let without_sample = describe(&sales(), None);
        assert!(!without_sample.contains("examples:"));
        assert!(!without_sample.contains("characteristics:"));
    }

    #[test]
    fn test_volume_buckets() {
        assert_eq!(volume_bucket(None), None);
        assert_eq!(volume_bucket(Some(0)), None);
        assert_eq!(volume_bucket(Some(99)), Some("small catalog"));
        assert_eq!(volume_bucket(Some(100)), Some("medium catalog"));
        assert_eq!(volume_bucket(Some(9_999)), Some("moderate volume"));
        assert_eq!(volume_bucket(Some(10_000)), Some("high volume"));
        assert_eq!(volume_bucket(Some(100_000)), Some("very high volume"));
        assert_eq!(group_thousands(1_234_567), "1,234,567");
        assert_eq!(group_thousands(999), "999");
    }

    #[test]
    fn test_purpose_inference() {
        assert_eq!(Purpose::infer("CLIENTES"), Some(Purpose::Customer));
        assert_eq!(Purpose::infer("ARTICULOS"), Some(Purpose::Product));
        assert_eq!(Purpose::infer("DOCTOS_PV_DET"), Some(Purpose::Sales));
        assert_eq!(Purpose::infer("PRODUCT_GROUPS"), Some(Purpose::Product));
        assert_eq!(Purpose::infer("XYZ"), None);

        let fallback = TableMetadata::new("LEDGER")
            .with_column("POSTED_DATE", "DATE", true)
            .with_column("AMOUNT", "DECIMAL", true);
        assert!(describe(&fallback, None).starts_with("transactional records with dates and amounts"));
    }

    #[test]
    fn test_search_terms_capped() {
        let mut meta = TableMetadata::new("SALES_CUSTOMER_PRODUCT_STOCK_PURCHASE_DET")
            .with_column("STATUS", "VARCHAR", true)
            .with_column("PRICE", "DECIMAL", true)
            .with_column("QTY", "INTEGER", true)
            .with_column("CREATED_DATE", "DATE", true);
        meta.row_count = Some(5);
        let text = describe(&meta, None);
        let terms = text.rsplit(SEPARATOR).next().unwrap();
        let list = terms.trim_start_matches("search terms: ");
        assert_eq!(list.split(", ").count(), MAX_SEARCH_TERMS);
    }
}
