//! Per-resource rules: which transforms run over which base table, and the
//! final column layout of each output table.

use crate::error::{EtlError, Result};
use crate::flatten::{
    assign_surrogate_keys, expand_array, explode, read_list, reorder, CanonicalOrder, ExplodeSpec,
};
use crate::types::Table;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Resources the pipeline knows how to transform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Resource {
    Products,
    Carts,
}

impl Resource {
    pub const ALL: [Resource; 2] = [Resource::Products, Resource::Carts];

    /// Collection name, also the final segment of the resource URL
    pub fn name(self) -> &'static str {
        match self {
            Resource::Products => "products",
            Resource::Carts => "carts",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn product_order() -> CanonicalOrder {
    CanonicalOrder::new()
        .columns(&[
            "id",
            "title",
            "description",
            "category",
            "subcategory",
            "price",
            "discountPercentage",
            "rating",
            "stock",
            "brand",
            "sku",
            "weight",
            "warrantyInformation",
            "shippingInformation",
            "availabilityStatus",
            "returnPolicy",
            "minimumOrderQuantity",
        ])
        .indexed("image")
        .columns(&[
            "thumbnail",
            "dimensions.width",
            "dimensions.height",
            "dimensions.depth",
            "meta.createdAt",
            "meta.updatedAt",
            "meta.barcode",
            "meta.qrCode",
        ])
}

fn review_order() -> CanonicalOrder {
    CanonicalOrder::new()
        .columns(&[
            "review_id",
            "product_id",
            "rating",
            "comment",
            "date",
            "reviewerName",
            "reviewerEmail",
        ])
        .remaining()
}

fn cart_order() -> CanonicalOrder {
    CanonicalOrder::new()
        .columns(&[
            "id",
            "userId",
            "total",
            "discountedTotal",
            "totalProducts",
            "totalQuantity",
        ])
        .prefixed("product_")
        .remaining()
}

/// Subcategory from a tag list: the second tag, else the first, else null.
///
/// An unparseable tag list yields null.
pub fn derive_subcategory(tags: &Value) -> Value {
    match read_list(tags) {
        Ok(mut tags) if tags.len() >= 2 => tags.swap_remove(1),
        Ok(mut tags) if tags.len() == 1 => tags.swap_remove(0),
        _ => Value::Null,
    }
}

/// Capitalize the first letter of every word and lowercase the rest.
///
/// A word starts at any letter not preceded by a letter, so
/// `home-decoration` becomes `Home-Decoration`.
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_word = false;
    for c in text.chars() {
        if c.is_alphabetic() {
            if in_word {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(c);
            in_word = false;
        }
    }
    out
}

fn title_case_value(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(title_case(s)),
        other => other.clone(),
    }
}

fn require(table: &Table, stage: &'static str, columns: &[&str]) -> Result<()> {
    match columns.iter().find(|c| !table.has_column(c)) {
        Some(missing) => Err(EtlError::MissingColumn {
            stage,
            column: missing.to_string(),
        }),
        None => Ok(()),
    }
}

/// Clean the raw products table.
///
/// Derives `subcategory` from `tags`, expands `images` into `image_<i>`,
/// title-cases `category` and `subcategory`, then projects onto the product
/// layout (which leaves out `tags` and `reviews`). An empty collection
/// yields an empty table.
pub fn transform_products(raw: &Table) -> Result<Table> {
    if raw.is_empty() {
        return Ok(Table::default());
    }
    require(raw, "products transform", &["tags", "images"])?;

    let table = raw.with_derived_column("subcategory", |row| {
        row.get("tags").map(derive_subcategory).unwrap_or(Value::Null)
    });
    let table = expand_array(&table, "images", "image")?;
    let table = table
        .map_column("category", title_case_value)
        .map_column("subcategory", title_case_value);
    let table = table.without_columns(&["tags"]);

    Ok(reorder(&table, &product_order()))
}

/// Build the reviews table from the raw products table.
///
/// One row per review, linked by `product_id` and numbered by `review_id`.
pub fn transform_reviews(raw: &Table) -> Result<Table> {
    if raw.is_empty() {
        return Ok(Table::default());
    }
    let spec = ExplodeSpec::new("reviews").carrying("id", "product_id");
    let reviews = explode(raw, &spec)?;
    let reviews = assign_surrogate_keys(&reviews, "review_id");
    Ok(reorder(&reviews, &review_order()))
}

/// Flatten carts into one row per cart line, product fields as `product_*`
pub fn transform_carts(raw: &Table) -> Result<Table> {
    if raw.is_empty() {
        return Ok(Table::default());
    }
    let spec = ExplodeSpec::new("products").prefixed("product");
    let lines = explode(raw, &spec)?;
    Ok(reorder(&lines, &cart_order()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flatten::normalize;
    use serde_json::json;

    fn raw(value: Value) -> Table {
        normalize(&serde_json::from_value::<Vec<crate::types::Record>>(value).unwrap())
    }

    fn products() -> Table {
        raw(json!([
            {
                "id": 1,
                "title": "Essence Mascara",
                "category": "beauty",
                "price": 9.99,
                "tags": ["beauty", "mascara"],
                "images": ["m1.png", "m2.png", "m3.png", "m4.png"],
                "thumbnail": "m.png",
                "dimensions": {"width": 23.17, "height": 14.43, "depth": 28.01},
                "reviews": [
                    {"rating": 2, "comment": "Very unhappy", "date": "2024-05-23", "reviewerName": "John", "reviewerEmail": "john@x.com"},
                    {"rating": 4, "comment": "Would buy again", "date": "2024-05-23", "reviewerName": "Anna", "reviewerEmail": "anna@x.com"}
                ],
                "meta": {"barcode": "9164", "qrCode": "qr.png"}
            },
            {
                "id": 2,
                "title": "Sofa",
                "category": "home-decoration",
                "price": 499.99,
                "tags": "['furniture']",
                "images": "['s1.png']",
                "thumbnail": "s.png",
                "dimensions": {"width": 1.0, "height": 2.0, "depth": 3.0},
                "reviews": [],
                "meta": {"barcode": "1", "qrCode": "q"}
            },
            {
                "id": 3,
                "title": "Oddity",
                "category": "MENS-shirts",
                "price": 1,
                "tags": "[not a list",
                "images": "oops",
                "thumbnail": "o.png",
                "dimensions": {"width": 1, "height": 1, "depth": 1},
                "reviews": "[{'rating': 5, 'comment': 'Great', 'date': 'd', 'reviewerName': 'Z', 'reviewerEmail': 'z@x'}]",
                "meta": {"barcode": "2", "qrCode": "r"}
            }
        ]))
    }

    #[test]
    fn test_subcategory_rule() {
        assert_eq!(derive_subcategory(&json!(["a", "b", "c"])), json!("b"));
        assert_eq!(derive_subcategory(&json!("['only']")), json!("only"));
        assert_eq!(derive_subcategory(&json!([])), Value::Null);
        assert_eq!(derive_subcategory(&json!("['broken")), Value::Null);
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("home-decoration"), "Home-Decoration");
        assert_eq!(title_case("MENS-shirts"), "Mens-Shirts");
        assert_eq!(title_case("skin care 2go"), "Skin Care 2Go");
        assert_eq!(title_case(""), "");
    }

    #[test]
    fn test_products_layout() {
        let out = transform_products(&products()).unwrap();

        assert_eq!(
            out.columns(),
            [
                "id", "title", "category", "subcategory", "price",
                "image_1", "image_2", "image_3", "image_4",
                "thumbnail", "dimensions.width", "dimensions.height", "dimensions.depth",
                "meta.barcode", "meta.qrCode"
            ]
        );

        let rows = out.rows();
        assert_eq!(rows[0]["category"], json!("Beauty"));
        assert_eq!(rows[0]["subcategory"], json!("Mascara"));
        assert_eq!(rows[1]["category"], json!("Home-Decoration"));
        assert_eq!(rows[1]["subcategory"], json!("Furniture"));
        assert_eq!(rows[2]["subcategory"], Value::Null);

        assert_eq!(rows[1]["image_1"], json!("s1.png"));
        assert_eq!(rows[1]["image_2"], Value::Null);
        // Malformed image list recovered as empty
        assert_eq!(rows[2]["image_1"], Value::Null);
    }

    #[test]
    fn test_products_require_source_fields() {
        let input = raw(json!([{"id": 1, "images": []}]));
        let err = transform_products(&input).unwrap_err();
        assert!(matches!(err, EtlError::MissingColumn { ref column, .. } if column == "tags"));
    }

    #[test]
    fn test_empty_collection_yields_empty_tables() {
        let empty = raw(json!([]));
        assert!(empty.columns().is_empty());

        for out in [
            transform_products(&empty).unwrap(),
            transform_reviews(&empty).unwrap(),
            transform_carts(&empty).unwrap(),
        ] {
            assert!(out.is_empty());
            assert!(out.columns().is_empty());
        }
    }

    #[test]
    fn test_reviews_table() {
        let out = transform_reviews(&products()).unwrap();

        assert_eq!(
            out.columns(),
            ["review_id", "product_id", "rating", "comment", "date", "reviewerName", "reviewerEmail"]
        );
        assert_eq!(out.len(), 4);

        let ids: Vec<u64> = out.column_values("review_id").map(|v| v.as_u64().unwrap()).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);

        let parents: Vec<u64> = out.column_values("product_id").map(|v| v.as_u64().unwrap()).collect();
        assert_eq!(parents, vec![1, 1, 2, 3]);

        // Product without reviews keeps one row of nulls
        assert_eq!(out.rows()[2]["rating"], Value::Null);
        assert_eq!(out.rows()[3]["comment"], json!("Great"));
    }

    #[test]
    fn test_reviews_abort_on_malformed_list() {
        let input = raw(json!([{"id": 1, "reviews": "[{'rating': 5"}]));
        assert!(matches!(
            transform_reviews(&input),
            Err(EtlError::MalformedList { .. })
        ));
    }

    #[test]
    fn test_cart_lines() {
        let input = raw(json!([{
            "id": 1,
            "products": [
                {"id": 168, "title": "Charger", "price": 79.99, "quantity": 1, "total": 79.99, "discountedTotal": 72.0, "thumbnail": "c.png"},
                {"id": 78, "title": "Laptop", "price": 1999.99, "quantity": 2, "total": 3999.98, "discountedTotal": 3700.0, "thumbnail": "l.png"}
            ],
            "total": 4079.97,
            "discountedTotal": 3772.0,
            "userId": 33,
            "totalProducts": 2,
            "totalQuantity": 3
        }]));

        let out = transform_carts(&input).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(
            out.columns(),
            [
                "id", "userId", "total", "discountedTotal", "totalProducts", "totalQuantity",
                "product_id", "product_title", "product_price", "product_quantity",
                "product_total", "product_discountedTotal", "product_thumbnail"
            ]
        );
        assert_eq!(out.rows()[0]["product_title"], json!("Charger"));
        assert_eq!(out.rows()[1]["product_title"], json!("Laptop"));
        assert_eq!(out.rows()[1]["userId"], json!(33));
    }

    #[test]
    fn test_resource_names() {
        assert_eq!(Resource::Products.to_string(), "products");
        assert_eq!(Resource::ALL.map(Resource::name), ["products", "carts"]);
    }
}
