use relquery::sql::{
    AssociationDescribe, EntityDescribe, FieldDescribe, MappingSchema, ScalarType, SchemaBuilder,
};
use relquery::{parse_query, translate_query, TranslatorConfig};

const DEFAULT_QUERY: &str = "Customer.group_join(Order, c => c.Id, o => o.CustomerId, \
                             (c, g) => new { c.Name, Orders = g.count() })";

fn demo_schema() -> MappingSchema {
    SchemaBuilder::new()
        .with_entity(
            EntityDescribe::new("Customer")
                .with_field(FieldDescribe::new("Id", ScalarType::Int).with_primary_key(0))
                .with_field(FieldDescribe::new("Name", ScalarType::Text).with_trimmable(true)),
        )
        .with_entity(
            EntityDescribe::new("Order")
                .with_table_name("orders")
                .with_field(FieldDescribe::new("Id", ScalarType::Int).with_primary_key(0))
                .with_field(FieldDescribe::new("CustomerId", ScalarType::Int))
                .with_field(FieldDescribe::new("Total", ScalarType::Double))
                .with_association(AssociationDescribe::new(
                    "Customer",
                    "Customer",
                    &["CustomerId"],
                    &["Id"],
                )),
        )
        .with_entity(
            EntityDescribe::new("OrderLine")
                .with_field(FieldDescribe::new("OrderId", ScalarType::Int).with_primary_key(0))
                .with_field(FieldDescribe::new("LineNo", ScalarType::Int).with_primary_key(1))
                .with_field(FieldDescribe::new("Quantity", ScalarType::Int)),
        )
        .build()
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut json = false;
    let mut query = None;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--json" => json = true,
            _ => query = Some(arg),
        }
    }
    let source = query.unwrap_or_else(|| DEFAULT_QUERY.to_string());

    println!("=== Query Translation Demo ===\n");
    println!("Query: {}\n", source);

    let expr = match parse_query(&source) {
        Ok(expr) => expr,
        Err(e) => {
            eprintln!("Parse error: {}", e);
            std::process::exit(1);
        }
    };

    let schema = demo_schema();
    let translated = match translate_query(&expr, &schema, TranslatorConfig::default()) {
        Ok(translated) => translated,
        Err(e) => {
            eprintln!("Translation error ({:?}): {}", e.kind(), e);
            std::process::exit(1);
        }
    };

    if json {
        print_json(&translated);
        return;
    }

    println!("--- Fragments ---");
    for query in translated.model.queries() {
        println!("  {}: {}", query.id, translated.model.display(query.id));
    }
    println!();
    println!("--- Root ---");
    println!("{}", translated.model.display(translated.root));
    println!();
    println!("--- Shape ---");
    println!("{:#?}", translated.shape);
}

#[cfg(feature = "serde")]
fn print_json(translated: &relquery::TranslatedQuery) {
    match serde_json::to_string_pretty(translated) {
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("Serialization error: {}", e),
    }
}

#[cfg(not(feature = "serde"))]
fn print_json(_translated: &relquery::TranslatedQuery) {
    eprintln!("JSON output requires the `serde` feature");
}
