use catalog_scan::core::{ItemStore, Projection, ReductionMode, ScanFilter, TableScanner};
use catalog_scan::report::{no_items_message, ReportFields, WinnerReport};
use std::io::Write;

pub(crate) struct HandlerDeps<S: ItemStore> {
    pub scanner: TableScanner<S>,
    pub filter: ScanFilter,
    pub projection: Projection,
    pub report_fields: ReportFields,
    pub reduction: ReductionMode,
}

/// One scan-and-report cycle. Store failures and missing report fields end the run.
#[tracing::instrument(skip(deps, out))]
pub(crate) async fn function_handler<S: ItemStore, W: Write>(
    deps: &HandlerDeps<S>,
    out: &mut W,
) -> anyhow::Result<()> {
    let winner = deps
        .scanner
        .longest_title(
            &deps.filter,
            &deps.projection,
            &deps.report_fields.title,
            deps.reduction,
        )
        .await?;

    match winner {
        None => writeln!(out, "{}", no_items_message(&deps.filter))?,
        Some(winner) => {
            let report = WinnerReport::new(&winner, &deps.report_fields)?;
            writeln!(out, "{}", report)?;
        }
    }

    Ok(())
}
