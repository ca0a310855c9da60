use core::dialect::Dialect;
use core::semantic_type::SemanticType;
use core::source_spec::{Coercion, FieldSpec, SourceFormat, SourceSpec};

/// The four example `SourceSpec`s this binary ships out of the box, one
/// per business system in `original_source/src/sources/systems/*`: sales
/// (delimited), inventory (spreadsheet), financial (document/JSON), and
/// customer (delimited with header aliases and cleanup coercions). A
/// real deployment would replace this list with its own declarations;
/// these exist so the workspace is runnable end to end and the
/// integration tests have concrete fixtures.
pub fn example_sources(dialect: Dialect) -> Vec<SourceSpec> {
    vec![sales(dialect), inventory(dialect), financial(dialect), customer(dialect)]
}

/// `original_source/src/sources/systems/sales/sales.py`'s `SALES`:
/// delimited, no header aliases, grain on `transaction_id`, a two-check
/// audit query on `total_amount`/`unit_price` positivity.
fn sales(dialect: Dialect) -> SourceSpec {
    SourceSpec::new(
        "sales",
        "sales_*.csv",
        "transactions",
        vec!["transaction_id".to_string()],
        vec![
            FieldSpec::new("transaction_id", SemanticType::String),
            FieldSpec::new("customer_id", SemanticType::String),
            FieldSpec::new("product_sku", SemanticType::String),
            FieldSpec::new("quantity", SemanticType::Int),
            FieldSpec::new("unit_price", SemanticType::Float),
            FieldSpec::new("total_amount", SemanticType::Float),
            FieldSpec::new("sale_date", SemanticType::Date),
            FieldSpec::new("sales_rep", SemanticType::String),
        ],
        SourceFormat::Delimited { delimiter: b',', skip_rows: 0 },
        dialect,
    )
    .with_audit_query(
        "SELECT CASE WHEN \
            SUM(CASE WHEN total_amount > 0 THEN 1 ELSE 0 END) = COUNT(*) AND \
            SUM(CASE WHEN unit_price > 0 THEN 1 ELSE 0 END) = COUNT(*) \
         THEN 1 ELSE 0 END AS passed FROM {table}",
    )
}

/// `original_source/src/sources/systems/inventory/inventory.py`'s
/// `INVENTORY`: spreadsheet, `"Products"` sheet, one header row skipped,
/// every field aliased to its original title-cased column header, grain
/// on `sku`, a price-positivity audit.
fn inventory(dialect: Dialect) -> SourceSpec {
    SourceSpec::new(
        "inventory",
        "inventory_*.xlsx",
        "products",
        vec!["sku".to_string()],
        vec![
            FieldSpec::new("sku", SemanticType::String).with_alias("SKU").with_coercion(Coercion::MaxLength(100)),
            FieldSpec::new("name", SemanticType::String).with_alias("Product Name").with_coercion(Coercion::MaxLength(100)),
            FieldSpec::new("category", SemanticType::String).with_alias("Category").with_coercion(Coercion::MaxLength(100)),
            FieldSpec::new("price", SemanticType::Float).with_alias("Price"),
            FieldSpec::new("stock_quantity", SemanticType::Int).with_alias("Stock Qty"),
            FieldSpec::new("supplier", SemanticType::String).with_alias("Supplier").with_coercion(Coercion::MaxLength(100)),
            FieldSpec::new("last_updated", SemanticType::Datetime).with_alias("Last Updated"),
        ],
        SourceFormat::Spreadsheet { sheet_name: Some("Products".to_string()), skip_rows: 1 },
        dialect,
    )
    .with_audit_query("SELECT CASE WHEN SUM(CASE WHEN price > 0 THEN 1 ELSE 0 END) = COUNT(*) THEN 1 ELSE 0 END AS passed FROM {table}")
}

/// `original_source/src/sources/systems/financial/financial.py`'s
/// `FINANCIAL`: document/JSON under the `entries.item` array path,
/// `debit_amount`/`credit_amount` optional, grain on `entry_id`.
fn financial(dialect: Dialect) -> SourceSpec {
    SourceSpec::new(
        "financial",
        "ledger_*.json",
        "ledger_entries",
        vec!["entry_id".to_string()],
        vec![
            FieldSpec::new("entry_id", SemanticType::Int),
            FieldSpec::new("account_code", SemanticType::String),
            FieldSpec::new("account_name", SemanticType::String),
            FieldSpec::new("debit_amount", SemanticType::optional(SemanticType::Float)),
            FieldSpec::new("credit_amount", SemanticType::optional(SemanticType::Float)),
            FieldSpec::new("description", SemanticType::String),
            FieldSpec::new("transaction_date", SemanticType::Date),
            FieldSpec::new("reference_number", SemanticType::String),
        ],
        SourceFormat::Document { array_path: Some("entries.item".to_string()) },
        dialect,
    )
}

/// `original_source/src/sources/systems/customer/customer.py`'s
/// `CUSTOMERS`: delimited, header aliases on most fields, phone columns
/// cleaned to digits only and the email lowercased/trimmed - the
/// original's `clean_phone`/`clean_email` pydantic `field_validator`s
/// become declarative `Coercion::StripNonDigits`/`Lowercase` instead of
/// bespoke regex validators, per `core::source_spec::Coercion`'s purpose.
fn customer(dialect: Dialect) -> SourceSpec {
    SourceSpec::new(
        "customer",
        "customers-*.csv",
        "customers",
        vec!["customer_id".to_string()],
        vec![
            FieldSpec::new("customer_id", SemanticType::String).with_alias("Customer Id").with_coercion(Coercion::MaxLength(50)),
            FieldSpec::new("first_name", SemanticType::String).with_alias("First Name").with_coercion(Coercion::MaxLength(100)),
            FieldSpec::new("last_name", SemanticType::String).with_alias("Last Name").with_coercion(Coercion::MaxLength(100)),
            FieldSpec::new("company_name", SemanticType::String).with_alias("Company").with_coercion(Coercion::MaxLength(100)),
            FieldSpec::new("city", SemanticType::String).with_coercion(Coercion::MaxLength(100)),
            FieldSpec::new("country", SemanticType::String).with_coercion(Coercion::MaxLength(100)),
            FieldSpec::new("phone_one", SemanticType::String).with_alias("Phone 1").with_coercion(Coercion::StripNonDigits).with_coercion(Coercion::MaxLength(25)),
            FieldSpec::new("phone_two", SemanticType::String).with_alias("Phone 2").with_coercion(Coercion::StripNonDigits).with_coercion(Coercion::MaxLength(25)),
            FieldSpec::new("email", SemanticType::String).with_coercion(Coercion::Trim).with_coercion(Coercion::Lowercase).with_coercion(Coercion::MaxLength(100)),
            FieldSpec::new("subscription_date", SemanticType::Date).with_alias("Subscription Date"),
            FieldSpec::new("website", SemanticType::String).with_coercion(Coercion::MaxLength(100)),
        ],
        SourceFormat::Delimited { delimiter: b',', skip_rows: 0 },
        dialect,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_example_source_has_a_distinct_file_pattern() {
        let sources = example_sources(Dialect::Sqlite);
        let mut patterns: Vec<&str> = sources.iter().map(|s| s.file_pattern()).collect();
        patterns.sort();
        patterns.dedup();
        assert_eq!(patterns.len(), sources.len());
    }

    #[test]
    fn inventory_fields_are_read_from_their_original_title_cased_headers() {
        let inventory = &example_sources(Dialect::Sqlite)[1];
        let sku = inventory.fields().iter().find(|f| f.name() == "sku").unwrap();
        assert_eq!(sku.alias(), "SKU");
    }

    #[test]
    fn financial_amounts_are_optional() {
        let financial = &example_sources(Dialect::Sqlite)[2];
        let debit = financial.fields().iter().find(|f| f.name() == "debit_amount").unwrap();
        assert!(debit.semantic_type().is_optional());
    }

    #[test]
    fn customer_phone_columns_strip_non_digits() {
        let customer = &example_sources(Dialect::Sqlite)[3];
        let phone = customer.fields().iter().find(|f| f.name() == "phone_one").unwrap();
        assert!(phone.coercions().contains(&Coercion::StripNonDigits));
    }
}
