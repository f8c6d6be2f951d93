//! Declarative expression graphs for the Earth Engine `value:compute` API.
//!
//! Nothing here talks to the network. Builders assemble an [`Expr`] tree and
//! [`Expression::encode`] flattens it into the wire format, hoisting function
//! bodies into the shared `values` table.

use crate::core::geometry::AreaOfInterest;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Constant(Value),
    Invocation {
        function: String,
        arguments: BTreeMap<String, Expr>,
    },
    Argument(String),
    Function {
        arguments: Vec<String>,
        body: Box<Expr>,
    },
    Array(Vec<Expr>),
}

impl Expr {
    pub fn constant(value: impl Into<Value>) -> Self {
        Expr::Constant(value.into())
    }

    pub fn call<const N: usize>(function: &str, arguments: [(&str, Expr); N]) -> Self {
        Expr::Invocation {
            function: function.to_string(),
            arguments: arguments
                .into_iter()
                .map(|(name, value)| (name.to_string(), value))
                .collect(),
        }
    }

    pub fn function(argument: &str, body: Expr) -> Self {
        Expr::Function {
            arguments: vec![argument.to_string()],
            body: Box::new(body),
        }
    }
}

/// Wire form: `{"result": key, "values": {key: node}}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Expression {
    pub result: String,
    pub values: BTreeMap<String, Value>,
}

impl Expression {
    pub fn encode(root: &Expr) -> Self {
        let mut encoder = Encoder::default();
        let node = encoder.node(root);
        let result = encoder.store(node);
        Expression {
            result,
            values: encoder.values,
        }
    }

    pub fn to_json(&self) -> Value {
        json!({ "result": self.result, "values": self.values })
    }
}

#[derive(Default)]
struct Encoder {
    values: BTreeMap<String, Value>,
}

impl Encoder {
    fn store(&mut self, node: Value) -> String {
        let key = self.values.len().to_string();
        self.values.insert(key.clone(), node);
        key
    }

    fn node(&mut self, expr: &Expr) -> Value {
        match expr {
            Expr::Constant(value) => json!({ "constantValue": value }),
            Expr::Invocation {
                function,
                arguments,
            } => {
                let mut encoded = Map::new();
                for (name, argument) in arguments {
                    encoded.insert(name.clone(), self.node(argument));
                }
                json!({
                    "functionInvocationValue": {
                        "functionName": function,
                        "arguments": encoded,
                    }
                })
            }
            Expr::Argument(name) => json!({ "argumentReference": name }),
            Expr::Function { arguments, body } => {
                let body_node = self.node(body);
                let body_key = self.store(body_node);
                json!({
                    "functionDefinitionValue": {
                        "argumentNames": arguments,
                        "body": body_key,
                    }
                })
            }
            Expr::Array(items) => {
                let encoded: Vec<Value> = items.iter().map(|item| self.node(item)).collect();
                json!({ "arrayValue": { "values": encoded } })
            }
        }
    }
}

/// 將使用者區域轉為平台的幾何建構式
pub fn geometry_expr(area: &AreaOfInterest) -> Expr {
    let coordinates: Vec<Value> = area
        .shape()
        .0
        .iter()
        .map(|polygon| {
            let rings: Vec<Value> = std::iter::once(polygon.exterior())
                .chain(polygon.interiors())
                .map(|ring| Value::from(ring.0.iter().map(|c| json!([c.x, c.y])).collect::<Vec<_>>()))
                .collect();
            Value::from(rings)
        })
        .collect();

    Expr::call(
        "GeometryConstructors.MultiPolygon",
        [
            ("coordinates", Expr::constant(coordinates)),
            ("evenOdd", Expr::constant(true)),
        ],
    )
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reducer(pub Expr);

impl Reducer {
    pub fn mean() -> Self {
        Reducer(Expr::call("Reducer.mean", []))
    }

    pub fn sum() -> Self {
        Reducer(Expr::call("Reducer.sum", []))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Image(pub Expr);

impl Image {
    pub fn constant(value: f64) -> Self {
        Image(Expr::call("Image.constant", [("value", Expr::constant(value))]))
    }

    pub fn multiply(self, factor: f64) -> Self {
        Image(Expr::call(
            "Image.multiply",
            [("image1", self.0), ("image2", Image::constant(factor).0)],
        ))
    }

    pub fn add(self, offset: f64) -> Self {
        Image(Expr::call(
            "Image.add",
            [("image1", self.0), ("image2", Image::constant(offset).0)],
        ))
    }

    pub fn normalized_difference(self, first: &str, second: &str) -> Self {
        Image(Expr::call(
            "Image.normalizedDifference",
            [
                ("input", self.0),
                ("bandNames", Expr::constant(json!([first, second]))),
            ],
        ))
    }

    pub fn rename(self, name: &str) -> Self {
        Image(Expr::call(
            "Image.rename",
            [("input", self.0), ("names", Expr::constant(json!([name])))],
        ))
    }

    pub fn add_bands(self, other: Image) -> Self {
        Image(Expr::call(
            "Image.addBands",
            [("dstImg", self.0), ("srcImg", other.0)],
        ))
    }

    pub fn select(self, band: &str) -> Self {
        Image(Expr::call(
            "Image.select",
            [
                ("input", self.0),
                ("bandSelectors", Expr::constant(json!([band]))),
            ],
        ))
    }

    pub fn clip(self, area: &AreaOfInterest) -> Self {
        Image(Expr::call(
            "Image.clip",
            [("input", self.0), ("geometry", geometry_expr(area))],
        ))
    }

    /// `top` over `self`; masked pixels of `top` show `self`.
    pub fn blend(self, top: Image) -> Self {
        let collection = Expr::call(
            "ImageCollection.fromImages",
            [("images", Expr::Array(vec![self.0, top.0]))],
        );
        Image(Expr::call("ImageCollection.mosaic", [("collection", collection)]))
    }

    pub fn reduce_region(
        self,
        reducer: Reducer,
        area: &AreaOfInterest,
        scale: f64,
        max_pixels: f64,
    ) -> Expr {
        Expr::call(
            "Image.reduceRegion",
            [
                ("image", self.0),
                ("reducer", reducer.0),
                ("geometry", geometry_expr(area)),
                ("scale", Expr::constant(scale)),
                ("maxPixels", Expr::constant(max_pixels)),
            ],
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageCollection(pub Expr);

/// `map` 回呼的參數名稱
const MAP_ARGUMENT: &str = "_MAPPING_VAR_0_0";

impl ImageCollection {
    pub fn load(id: &str) -> Self {
        ImageCollection(Expr::call("ImageCollection.load", [("id", Expr::constant(id))]))
    }

    pub fn filter_bounds(self, area: &AreaOfInterest) -> Self {
        let filter = Expr::call(
            "Filter.intersects",
            [
                ("leftField", Expr::constant(".all")),
                ("rightValue", geometry_expr(area)),
            ],
        );
        self.filter(filter)
    }

    pub fn filter_date(self, start: &str, end: &str) -> Self {
        let range = Expr::call(
            "DateRange",
            [("start", Expr::constant(start)), ("end", Expr::constant(end))],
        );
        let filter = Expr::call(
            "Filter.dateRangeContains",
            [
                ("leftValue", range),
                ("rightField", Expr::constant("system:time_start")),
            ],
        );
        self.filter(filter)
    }

    fn filter(self, filter: Expr) -> Self {
        ImageCollection(Expr::call(
            "Collection.filter",
            [("collection", self.0), ("filter", filter)],
        ))
    }

    /// Ascending sort on an image property.
    pub fn sort(self, property: &str) -> Self {
        ImageCollection(Expr::call(
            "Collection.limit",
            [("collection", self.0), ("key", Expr::constant(property))],
        ))
    }

    pub fn map(self, f: impl FnOnce(Image) -> Image) -> Self {
        let body = f(Image(Expr::Argument(MAP_ARGUMENT.to_string())));
        ImageCollection(Expr::call(
            "Collection.map",
            [
                ("collection", self.0),
                ("baseAlgorithm", Expr::function(MAP_ARGUMENT, body.0)),
            ],
        ))
    }

    pub fn select(self, band: &str) -> Self {
        let band = band.to_string();
        self.map(move |image| image.select(&band))
    }

    pub fn median(self) -> Image {
        Image(Expr::call("reduce.median", [("collection", self.0)]))
    }

    pub fn first(self) -> Image {
        Image(Expr::call("Collection.first", [("collection", self.0)]))
    }
}
