use crate::{
    core::{ContinuationToken, FieldValue, Item, ItemStore, Page, Projection, ScanFilter},
    error::ScanError,
};
use async_trait::async_trait;
use aws_sdk_dynamodb::{
    error::DisplayErrorContext, primitives::Blob, types::AttributeValue, Client,
};
use std::collections::HashMap;

#[derive(Debug)]
pub struct DynamoDbItemStore {
    table_name: String,
    dynamodb_client: Client,
    page_size: Option<i32>,
}

impl DynamoDbItemStore {
    pub fn new(table_name: String, dynamodb_client: Client) -> Self {
        Self {
            table_name,
            dynamodb_client,
            page_size: None,
        }
    }

    /// Caps the number of items DynamoDB evaluates per call.
    pub fn with_page_size(mut self, page_size: Option<i32>) -> Self {
        self.page_size = page_size;
        self
    }
}

#[async_trait]
impl ItemStore for DynamoDbItemStore {
    async fn scan_page(
        &self,
        filter: &ScanFilter,
        projection: &Projection,
        exclusive_start: Option<ContinuationToken>,
    ) -> Result<Page, ScanError> {
        tracing::debug!(
            table = %self.table_name,
            resuming = exclusive_start.is_some(),
            "Scanning"
        );
        let expressions = ScanExpressions::build(filter, projection);

        let result = self
            .dynamodb_client
            .scan()
            .table_name(&self.table_name)
            .filter_expression(expressions.filter_expression)
            .set_projection_expression(expressions.projection_expression)
            .set_expression_attribute_names(Some(expressions.names))
            .set_expression_attribute_values(Some(expressions.values))
            .set_exclusive_start_key(exclusive_start.map(to_dynamodb_key))
            .set_limit(self.page_size)
            .send()
            .await
            .map_err(|e| ScanError::Transport(DisplayErrorContext(&e).to_string()))?;

        let items = result
            .items
            .unwrap_or_default()
            .into_iter()
            .map(to_item)
            .collect();
        let continuation = result
            .last_evaluated_key
            .filter(|key| !key.is_empty())
            .map(|key| {
                ContinuationToken::new(key.into_iter().map(|(k, v)| (k, v.into())).collect())
            });

        Ok(Page {
            items,
            continuation,
        })
    }
}

fn to_item(item: HashMap<String, AttributeValue>) -> Item {
    item.into_iter().map(|(k, v)| (k, FieldValue::from(v))).collect()
}

fn to_dynamodb_key(token: ContinuationToken) -> HashMap<String, AttributeValue> {
    token
        .into_key()
        .into_iter()
        .map(|(k, v)| (k, v.into()))
        .collect()
}

/// Filter and projection expressions with every field name aliased, so
/// reserved words like `Type` can be used as-is.
#[derive(Debug, PartialEq)]
struct ScanExpressions {
    filter_expression: String,
    projection_expression: Option<String>,
    names: HashMap<String, String>,
    values: HashMap<String, AttributeValue>,
}

impl ScanExpressions {
    fn build(filter: &ScanFilter, projection: &Projection) -> Self {
        let mut aliases = NameAliases::default();

        let discriminator = aliases.alias(&filter.discriminator_field);
        let state = aliases.alias(&filter.state_field);
        let filter_expression = format!(
            "{} = :discriminator AND {} <> :excluded_state",
            discriminator, state
        );

        let projected: Vec<String> = projection
            .fields()
            .iter()
            .map(|field| aliases.alias(field))
            .collect();
        let projection_expression = (!projected.is_empty()).then(|| projected.join(", "));

        let values = HashMap::from([
            (
                ":discriminator".to_string(),
                AttributeValue::S(filter.discriminator_value.clone()),
            ),
            (
                ":excluded_state".to_string(),
                AttributeValue::S(filter.excluded_state.clone()),
            ),
        ]);

        Self {
            filter_expression,
            projection_expression,
            names: aliases.names,
            values,
        }
    }
}

#[derive(Debug, Default)]
struct NameAliases {
    // alias -> field name, as DynamoDB expects it
    names: HashMap<String, String>,
    by_field: HashMap<String, String>,
}

impl NameAliases {
    fn alias(&mut self, field: &str) -> String {
        if let Some(alias) = self.by_field.get(field) {
            return alias.clone();
        }
        let alias = format!("#f{}", self.by_field.len());
        self.by_field.insert(field.to_string(), alias.clone());
        self.names.insert(alias.clone(), field.to_string());
        alias
    }
}

impl From<AttributeValue> for FieldValue {
    fn from(value: AttributeValue) -> Self {
        match value {
            AttributeValue::S(s) => FieldValue::Text(s),
            AttributeValue::N(n) => FieldValue::Number(n),
            AttributeValue::Bool(b) => FieldValue::Bool(b),
            AttributeValue::Null(_) => FieldValue::Null,
            AttributeValue::B(blob) => FieldValue::Binary(blob.into_inner()),
            AttributeValue::Ss(values) => FieldValue::TextSet(values),
            AttributeValue::Ns(values) => FieldValue::NumberSet(values),
            AttributeValue::Bs(values) => {
                FieldValue::BinarySet(values.into_iter().map(Blob::into_inner).collect())
            }
            AttributeValue::L(values) => {
                FieldValue::List(values.into_iter().map(FieldValue::from).collect())
            }
            AttributeValue::M(entries) => FieldValue::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, FieldValue::from(v)))
                    .collect(),
            ),
            other => {
                tracing::warn!("Unsupported attribute value, treating as null: {:?}", other);
                FieldValue::Null
            }
        }
    }
}

impl From<FieldValue> for AttributeValue {
    fn from(value: FieldValue) -> Self {
        match value {
            FieldValue::Text(s) => AttributeValue::S(s),
            FieldValue::Number(n) => AttributeValue::N(n),
            FieldValue::Bool(b) => AttributeValue::Bool(b),
            FieldValue::Null => AttributeValue::Null(true),
            FieldValue::Binary(bytes) => AttributeValue::B(Blob::new(bytes)),
            FieldValue::TextSet(values) => AttributeValue::Ss(values),
            FieldValue::NumberSet(values) => AttributeValue::Ns(values),
            FieldValue::BinarySet(values) => {
                AttributeValue::Bs(values.into_iter().map(Blob::new).collect())
            }
            FieldValue::List(values) => {
                AttributeValue::L(values.into_iter().map(AttributeValue::from).collect())
            }
            FieldValue::Map(entries) => AttributeValue::M(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, AttributeValue::from(v)))
                    .collect(),
            ),
        }
    }
}
