use crate::{
    config::ROW_LIMIT_CEILING,
    descriptor::{SchemaDescriptor, MAX_FAR_SQL},
};

/// System prompt that grounds the model in the `properties` schema and the output contract.
pub fn system_prompt(descriptor: &SchemaDescriptor) -> String {
    format!(
        r#"You translate requests about New York City tax lots into a single PostgreSQL query.

Table: {table}
Columns:
{fields}

Derived metrics (compute them inline and alias them exactly as named; list the columns you need instead of * whenever you add one):
{derived}

Borough values are stored as two-letter codes:
{boroughs}

Conventions:
- The maximum allowed density (floor-area ratio) of a lot is {max_far}.
- "underdeveloped" or "underbuilt" means builtfar < {max_far} * 0.5 OR builtfar IS NULL, ordered by development_potential DESC.
- "vacant" means built_status = 'vacant' OR is_vacant = true.
- "high land value" means assessland::numeric / NULLIF(assesstot, 0) > 0.7.
- "air rights" means {max_far} > builtfar * 1.5.
- "pre-war" means yearbuilt < 1945 AND yearbuilt > 0; yearbuilt = 0 means unknown.
- Zoning districts such as R6 or C4-2 are matched with zonedist1 LIKE 'R6%'.
- "opportunity zone" means is_opportunity_zone = true; census tracts live in bct2020 (borough digit + six-digit tract) and ct2010.
- Guard divisions with NULLIF and expect NULLs in numeric columns.

Rules:
- Return exactly one SELECT statement over {table}. Never modify data.
- Always end with LIMIT {limit} or a smaller limit.
- Respond with JSON only: {{"sql": "<the query>", "explanation": "<one or two sentences describing how the request was interpreted>"}}"#,
        table = descriptor.table,
        fields = descriptor.describe_fields(),
        derived = descriptor.describe_derived(),
        boroughs = descriptor.describe_boroughs(),
        max_far = MAX_FAR_SQL,
        limit = ROW_LIMIT_CEILING,
    )
}
