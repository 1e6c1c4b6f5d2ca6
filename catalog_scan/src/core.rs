use crate::error::ScanError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt::{self, Debug, Display};

#[cfg(any(test, feature = "mocks"))]
use mockall::automock;

/// A single attribute value as returned by the store.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    /// Numbers are kept in their wire representation to avoid precision loss.
    Number(String),
    Bool(bool),
    Null,
    Binary(Vec<u8>),
    TextSet(Vec<String>),
    NumberSet(Vec<String>),
    BinarySet(Vec<Vec<u8>>),
    List(Vec<FieldValue>),
    Map(BTreeMap<String, FieldValue>),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(text) | FieldValue::Number(text) => write!(f, "{}", text),
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Null => write!(f, "null"),
            FieldValue::Binary(bytes) => write!(f, "<{} bytes>", bytes.len()),
            FieldValue::TextSet(values) | FieldValue::NumberSet(values) => {
                write!(f, "{{{}}}", values.join(", "))
            }
            FieldValue::BinarySet(values) => write!(f, "{{{} binary values}}", values.len()),
            FieldValue::List(values) => {
                write!(f, "[")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", value)?;
                }
                write!(f, "]")
            }
            FieldValue::Map(entries) => {
                write!(f, "{{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                write!(f, "}}")
            }
        }
    }
}

/// Read-only snapshot of one record returned by a scan.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Item {
    fields: HashMap<String, FieldValue>,
}

impl Item {
    pub fn new(fields: HashMap<String, FieldValue>) -> Self {
        Self { fields }
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    pub fn text(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(FieldValue::as_text)
    }

    /// Looks up a field that the caller cannot do without.
    pub fn require(&self, field: &str) -> Result<&FieldValue, ScanError> {
        self.get(field)
            .ok_or_else(|| ScanError::MissingField(field.to_string()))
    }

    /// Like `require`, but the value must also be text.
    pub fn require_text(&self, field: &str) -> Result<&str, ScanError> {
        self.require(field)?
            .as_text()
            .ok_or_else(|| ScanError::NotText(field.to_string()))
    }

    /// Character count of the title's text; absent or non-text titles count as empty.
    pub fn title_length(&self, title_field: &str) -> usize {
        self.text(title_field).unwrap_or_default().chars().count()
    }
}

impl<K: Into<String>, V: Into<FieldValue>> FromIterator<(K, V)> for Item {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self::new(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// `discriminator_field = discriminator_value AND state_field <> excluded_state`
#[derive(Debug, Clone, PartialEq)]
pub struct ScanFilter {
    pub discriminator_field: String,
    pub discriminator_value: String,
    pub state_field: String,
    pub excluded_state: String,
}

impl ScanFilter {
    pub fn new(
        discriminator_field: impl Into<String>,
        discriminator_value: impl Into<String>,
        state_field: impl Into<String>,
        excluded_state: impl Into<String>,
    ) -> Self {
        Self {
            discriminator_field: discriminator_field.into(),
            discriminator_value: discriminator_value.into(),
            state_field: state_field.into(),
            excluded_state: excluded_state.into(),
        }
    }
}

/// Fields requested per item, in order and without duplicates.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    fields: Vec<String>,
}

impl Projection {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = vec![];
        for field in fields {
            let field = field.into();
            if !unique.contains(&field) {
                unique.push(field);
            }
        }
        Self { fields: unique }
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }
}

/// Opaque resume point handed back by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct ContinuationToken(HashMap<String, FieldValue>);

impl ContinuationToken {
    pub fn new(last_evaluated_key: HashMap<String, FieldValue>) -> Self {
        Self(last_evaluated_key)
    }

    pub fn into_key(self) -> HashMap<String, FieldValue> {
        self.0
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub items: Vec<Item>,
    pub continuation: Option<ContinuationToken>,
}

#[cfg_attr(any(test, feature = "mocks"), automock)]
#[async_trait]
pub trait ItemStore: Debug {
    async fn scan_page(
        &self,
        filter: &ScanFilter,
        projection: &Projection,
        exclusive_start: Option<ContinuationToken>,
    ) -> Result<Page, ScanError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Winner {
    pub item: Item,
    pub title_length: usize,
}

/// Running maximum over title length. Ties keep the item seen first.
#[derive(Debug)]
pub struct LongestTitle<'a> {
    title_field: &'a str,
    best: Option<Winner>,
}

impl<'a> LongestTitle<'a> {
    pub fn new(title_field: &'a str) -> Self {
        Self {
            title_field,
            best: None,
        }
    }

    pub fn offer(&mut self, item: Item) {
        let title_length = item.title_length(self.title_field);
        let longer = self
            .best
            .as_ref()
            .map_or(true, |best| title_length > best.title_length);
        if longer {
            self.best = Some(Winner { item, title_length });
        }
    }

    pub fn finish(self) -> Option<Winner> {
        self.best
    }
}

pub fn find_longest_title(items: Vec<Item>, title_field: &str) -> Option<Winner> {
    let mut longest = LongestTitle::new(title_field);
    items.into_iter().for_each(|item| longest.offer(item));
    longest.finish()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReductionMode {
    /// Collect every page, then reduce.
    #[default]
    Materialized,
    /// Fold each page into the running winner as it arrives.
    Streaming,
}

#[derive(Debug)]
pub struct TableScanner<S: ItemStore> {
    store: S,
}

impl<S: ItemStore> TableScanner<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Full scan accumulating every matching item in fetch order.
    #[tracing::instrument(skip(self))]
    pub async fn run_scan(
        &self,
        filter: &ScanFilter,
        projection: &Projection,
    ) -> Result<Vec<Item>, ScanError> {
        let mut items = vec![];
        let pages = self
            .for_each_page(filter, projection, |page| items.extend(page))
            .await?;

        tracing::info!(pages, items = items.len(), "Scan completed");
        Ok(items)
    }

    /// Same winner as `run_scan` followed by `find_longest_title`, without
    /// holding the whole result set.
    #[tracing::instrument(skip(self))]
    pub async fn scan_longest_title(
        &self,
        filter: &ScanFilter,
        projection: &Projection,
        title_field: &str,
    ) -> Result<Option<Winner>, ScanError> {
        let mut longest = LongestTitle::new(title_field);
        let pages = self
            .for_each_page(filter, projection, |page| {
                page.into_iter().for_each(|item| longest.offer(item))
            })
            .await?;

        tracing::info!(pages, "Streaming scan completed");
        Ok(longest.finish())
    }

    pub async fn longest_title(
        &self,
        filter: &ScanFilter,
        projection: &Projection,
        title_field: &str,
        mode: ReductionMode,
    ) -> Result<Option<Winner>, ScanError> {
        match mode {
            ReductionMode::Materialized => {
                let items = self.run_scan(filter, projection).await?;
                Ok(find_longest_title(items, title_field))
            }
            ReductionMode::Streaming => {
                self.scan_longest_title(filter, projection, title_field)
                    .await
            }
        }
    }

    // One request in flight at a time; each call carries the previous token.
    async fn for_each_page<F>(
        &self,
        filter: &ScanFilter,
        projection: &Projection,
        mut consume: F,
    ) -> Result<usize, ScanError>
    where
        F: FnMut(Vec<Item>),
    {
        let mut exclusive_start = None;
        let mut page_number = 0;
        loop {
            let Page {
                items,
                continuation,
            } = self
                .store
                .scan_page(filter, projection, exclusive_start.take())
                .await?;
            page_number += 1;
            tracing::debug!(
                page = page_number,
                items = items.len(),
                has_more = continuation.is_some(),
                "Fetched page"
            );
            consume(items);

            match continuation {
                Some(token) => exclusive_start = Some(token),
                None => return Ok(page_number),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use mockall::Sequence;

    use super::*;

    fn series_filter() -> ScanFilter {
        ScanFilter::new("Type", "SERIES", "AvailabilityState", "unavailable")
    }

    fn projection() -> Projection {
        Projection::new(["Type", "Title", "WebRef", "AvailabilityState"])
    }

    fn token(id: &str) -> ContinuationToken {
        ContinuationToken::new(HashMap::from([(
            "Id".to_string(),
            FieldValue::Text(id.to_string()),
        )]))
    }

    fn series(title: &str, web_ref: &str) -> Item {
        Item::from_iter([
            ("Type", "SERIES"),
            ("Title", title),
            ("WebRef", web_ref),
            ("AvailabilityState", "available"),
        ])
    }

    fn page(items: Vec<Item>, continuation: Option<ContinuationToken>) -> Page {
        Page {
            items,
            continuation,
        }
    }

    fn three_page_store() -> MockItemStore {
        let mut store = MockItemStore::new();
        let mut seq = Sequence::new();
        store
            .expect_scan_page()
            .withf(|filter, projection, start| {
                filter.discriminator_value == "SERIES"
                    && projection.fields().len() == 4
                    && start.is_none()
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| {
                Ok(page(
                    vec![series("One", "https://a/1"), series("Two", "https://a/2")],
                    Some(token("2")),
                ))
            });
        store
            .expect_scan_page()
            .withf(|_, _, start| *start == Some(token("2")))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(page(vec![], Some(token("2b")))));
        store
            .expect_scan_page()
            .withf(|_, _, start| *start == Some(token("2b")))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(page(vec![series("Three", "https://a/3")], None)));
        store
    }

    #[tokio::test]
    async fn when_store_paginates_should_chain_tokens_and_concatenate_pages() {
        let scanner = TableScanner::new(three_page_store());

        let result = scanner.run_scan(&series_filter(), &projection()).await;

        assert!(result.is_ok());
        let items = result.unwrap();
        let titles: Vec<_> = items.iter().map(|i| i.text("Title").unwrap()).collect();
        assert_eq!(titles, vec!["One", "Two", "Three"]);
    }

    #[tokio::test]
    async fn when_single_page_without_token_should_call_store_once() {
        let mut store = MockItemStore::new();
        store
            .expect_scan_page()
            .times(1)
            .returning(|_, _, _| Ok(page(vec![], None)));
        let scanner = TableScanner::new(store);

        let items = scanner
            .run_scan(&series_filter(), &projection())
            .await
            .unwrap();

        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn when_store_fails_should_stop_and_pass_error_up() {
        let mut store = MockItemStore::new();
        let mut seq = Sequence::new();
        store
            .expect_scan_page()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(page(vec![series("One", "https://a/1")], Some(token("1")))));
        store
            .expect_scan_page()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Err(ScanError::Transport("ThrottlingException".to_string())));
        let scanner = TableScanner::new(store);

        let result = scanner.run_scan(&series_filter(), &projection()).await;

        assert_eq!(
            result,
            Err(ScanError::Transport("ThrottlingException".to_string()))
        );
    }

    #[tokio::test]
    async fn when_scanned_twice_against_same_data_should_agree() {
        let mut store = MockItemStore::new();
        store
            .expect_scan_page()
            .withf(|_, _, start| start.is_none())
            .times(2)
            .returning(|_, _, _| {
                Ok(page(vec![series("Short", "https://a/1")], Some(token("1"))))
            });
        store
            .expect_scan_page()
            .withf(|_, _, start| start.is_some())
            .times(2)
            .returning(|_, _, _| Ok(page(vec![series("Much longer", "https://a/2")], None)));
        let scanner = TableScanner::new(store);

        let first = scanner
            .run_scan(&series_filter(), &projection())
            .await
            .unwrap();
        let second = scanner
            .run_scan(&series_filter(), &projection())
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(
            find_longest_title(first, "Title"),
            find_longest_title(second, "Title")
        );
    }

    #[tokio::test]
    async fn when_streaming_should_pick_same_winner_as_materialized() {
        let materialized = TableScanner::new(three_page_store())
            .longest_title(
                &series_filter(),
                &projection(),
                "Title",
                ReductionMode::Materialized,
            )
            .await
            .unwrap();
        let streaming = TableScanner::new(three_page_store())
            .longest_title(
                &series_filter(),
                &projection(),
                "Title",
                ReductionMode::Streaming,
            )
            .await
            .unwrap();

        assert_eq!(materialized, streaming);
        let winner = streaming.unwrap();
        assert_eq!(winner.item.text("Title"), Some("Three"));
        assert_eq!(winner.title_length, 5);
    }

    #[test]
    fn when_no_items_should_return_none() {
        assert_eq!(find_longest_title(vec![], "Title"), None);
    }

    #[test]
    fn when_lengths_tie_should_keep_first_seen() {
        let items = vec![
            series("abc", "https://a/1"),
            series("abcdefg", "https://a/2"),
            series("gfedcba", "https://a/3"),
            series("ab", "https://a/4"),
        ];

        let winner = find_longest_title(items, "Title").unwrap();

        assert_eq!(winner.title_length, 7);
        assert_eq!(winner.item.text("WebRef"), Some("https://a/2"));
    }

    #[test]
    fn when_titles_differ_should_pick_longest() {
        let items = vec![
            Item::from_iter([("Title", "A")]),
            Item::from_iter([("Title", "Alpha")]),
            Item::from_iter([("Title", "Al")]),
        ];

        let winner = find_longest_title(items, "Title").unwrap();

        assert_eq!(winner.item, Item::from_iter([("Title", "Alpha")]));
        assert_eq!(winner.title_length, 5);
    }

    #[test]
    fn title_length_counts_characters_and_treats_absent_as_empty() {
        let untitled = Item::from_iter([("Type", "SERIES")]);
        let numeric = Item::new(HashMap::from([(
            "Title".to_string(),
            FieldValue::Number("12345".to_string()),
        )]));

        assert_eq!(Item::from_iter([("Title", "Æblegrød")]).title_length("Title"), 8);
        assert_eq!(untitled.title_length("Title"), 0);
        assert_eq!(numeric.title_length("Title"), 0);
    }

    #[test]
    fn when_every_title_is_missing_first_item_wins() {
        let items = vec![
            Item::from_iter([("WebRef", "https://a/1")]),
            Item::from_iter([("WebRef", "https://a/2")]),
        ];

        let winner = find_longest_title(items, "Title").unwrap();

        assert_eq!(winner.title_length, 0);
        assert_eq!(winner.item.text("WebRef"), Some("https://a/1"));
    }

    #[test]
    fn require_text_rejects_non_text_values() {
        let item = Item::new(HashMap::from([
            ("Title".to_string(), FieldValue::Number("1234567890".to_string())),
            ("WebRef".to_string(), FieldValue::Text("https://a/1".to_string())),
        ]));

        assert_eq!(item.require_text("WebRef"), Ok("https://a/1"));
        assert_eq!(
            item.require_text("Title"),
            Err(ScanError::NotText("Title".to_string()))
        );
        assert_eq!(
            item.require_text("Type"),
            Err(ScanError::MissingField("Type".to_string()))
        );
    }

    #[test]
    fn projection_keeps_first_occurrence_order() {
        let projection = Projection::new(["Type", "Title", "Type", "WebRef"]);

        assert_eq!(projection.fields(), ["Type", "Title", "WebRef"]);
    }

    #[test]
    fn require_reports_the_missing_field() {
        let item = series("One", "https://a/1");

        assert!(item.require("Title").is_ok());
        assert_eq!(
            item.require("Description"),
            Err(ScanError::MissingField("Description".to_string()))
        );
    }
}
