use crate::report_handler::{function_handler, HandlerDeps};
use catalog_scan::adapters::DynamoDbItemStore;
use catalog_scan::configuration::Configuration;
use catalog_scan::core::TableScanner;
use catalog_scan::observability::init_tracing;

mod report_handler;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let configuration = Configuration::load()?;
    init_tracing(&configuration.log_level);
    tracing::info!("{}", configuration);

    let sdk_config = configuration.sdk_config().await;
    let dynamodb_client = aws_sdk_dynamodb::Client::new(&sdk_config);
    let store = DynamoDbItemStore::new(configuration.table_name.clone(), dynamodb_client)
        .with_page_size(configuration.page_size);

    let deps = HandlerDeps {
        scanner: TableScanner::new(store),
        filter: configuration.scan_filter(),
        projection: configuration.projection(),
        report_fields: configuration.report_fields(),
        reduction: configuration.reduction,
    };

    tracing::info!("Scanning table, this can take a while...");
    function_handler(&deps, &mut std::io::stdout()).await
}
