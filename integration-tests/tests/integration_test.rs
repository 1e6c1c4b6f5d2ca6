use catalog_scan::adapters::DynamoDbItemStore;
use catalog_scan::configuration::Configuration;
use catalog_scan::core::{find_longest_title, ReductionMode, TableScanner};

// Needs APP_TABLE_NAME (and optionally APP_PROFILE / APP_REGION) pointing at a real table.
async fn scanner(configuration: &Configuration) -> TableScanner<DynamoDbItemStore> {
    let sdk_config = configuration.sdk_config().await;
    let dynamodb_client = aws_sdk_dynamodb::Client::new(&sdk_config);
    TableScanner::new(
        DynamoDbItemStore::new(configuration.table_name.clone(), dynamodb_client)
            .with_page_size(Some(25)),
    )
}

#[ignore]
#[tokio::test]
async fn when_scanning_live_table_items_should_match_filter() {
    let configuration = Configuration::load().unwrap();
    let scanner = scanner(&configuration).await;
    let filter = configuration.scan_filter();

    let items = scanner
        .run_scan(&filter, &configuration.projection())
        .await
        .unwrap();

    for item in &items {
        assert_eq!(
            item.text(&filter.discriminator_field),
            Some(filter.discriminator_value.as_str())
        );
        assert_ne!(
            item.text(&filter.state_field),
            Some(filter.excluded_state.as_str())
        );
    }
}

#[ignore]
#[tokio::test]
async fn when_scanning_live_table_twice_should_pick_same_winner() {
    let configuration = Configuration::load().unwrap();
    let scanner = scanner(&configuration).await;
    let filter = configuration.scan_filter();
    let projection = configuration.projection();

    let materialized = scanner
        .run_scan(&filter, &projection)
        .await
        .map(|items| find_longest_title(items, &configuration.title_field))
        .unwrap();
    let streaming = scanner
        .longest_title(
            &filter,
            &projection,
            &configuration.title_field,
            ReductionMode::Streaming,
        )
        .await
        .unwrap();

    assert_eq!(
        materialized.map(|w| w.title_length),
        streaming.map(|w| w.title_length)
    );
}
