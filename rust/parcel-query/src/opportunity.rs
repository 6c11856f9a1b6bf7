//! SQL for operator-authored opportunity types.
//!
//! `criteria` is trusted operator text and is spliced verbatim. The borough filter uses the
//! canonical code from the borough table, never the caller's raw input.

use crate::{
    config::ROW_LIMIT_CEILING,
    descriptor::{lookup_borough, Borough, SchemaDescriptor},
    error::{Result, ServiceError},
    models::OpportunityType,
};

/// Sort column for an opportunity, chosen from keywords in its display name.
pub fn sort_column(display_name: &str) -> &'static str {
    let name = display_name.to_lowercase();
    if name.contains("vacant") {
        "lotarea"
    } else if ["underbuilt", "under-built", "underdeveloped", "under-developed"]
        .iter()
        .any(|keyword| name.contains(keyword))
    {
        "development_potential"
    } else if name.contains("value") {
        "value_ratio"
    } else {
        "assesstot"
    }
}

/// Normalizes an optional region filter. Blank input means "all boroughs".
pub fn resolve_region(region: Option<&str>) -> Result<Option<&'static Borough>> {
    match region.map(str::trim).filter(|region| !region.is_empty()) {
        None => Ok(None),
        Some(region) => lookup_borough(region).map(Some).ok_or_else(|| {
            ServiceError::InvalidRequest(format!("unknown borough '{region}'"))
        }),
    }
}

pub fn build_sql(
    descriptor: &SchemaDescriptor,
    opportunity: &OpportunityType,
    borough: Option<&Borough>,
) -> String {
    let mut sql = format!(
        "{} WHERE ({})",
        descriptor.base_select(),
        opportunity.criteria.trim()
    );
    if let Some(borough) = borough {
        sql.push_str(&format!(" AND borough = '{}'", borough.code));
    }
    sql.push_str(&format!(
        " ORDER BY {} DESC NULLS LAST LIMIT {ROW_LIMIT_CEILING}",
        sort_column(&opportunity.name)
    ));
    sql
}
