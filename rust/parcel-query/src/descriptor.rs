//! Static description of the `properties` table used to ground both translators.

use serde::Serialize;

pub const PROPERTIES_TABLE: &str = "properties";

/// Largest floor-area ratio the zoning allows for the lot, across use groups.
pub const MAX_FAR_SQL: &str = "GREATEST(residfar, commfar, facilfar)";

pub const DEVELOPMENT_POTENTIAL_SQL: &str =
    "(GREATEST(residfar, commfar, facilfar) - COALESCE(builtfar, 0)) * lotarea";

pub const VALUE_RATIO_SQL: &str = "assessland::numeric / NULLIF(assesstot, 0)";

pub const ZONING_EFFICIENCY_SQL: &str =
    "builtfar / NULLIF(GREATEST(residfar, commfar, facilfar), 0)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Numeric,
    Text,
    Categorical,
    Boolean,
    Year,
}

impl FieldKind {
    fn label(self) -> &'static str {
        match self {
            FieldKind::Numeric => "numeric",
            FieldKind::Text => "text",
            FieldKind::Categorical => "categorical",
            FieldKind::Boolean => "boolean",
            FieldKind::Year => "year",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub meaning: &'static str,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct DerivedMetric {
    pub name: &'static str,
    pub sql: &'static str,
    pub meaning: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Borough {
    pub code: &'static str,
    pub name: &'static str,
    /// Five-digit state and county FIPS prefix of the borough's census tract GEOIDs.
    pub county_fips: &'static str,
    /// Lower-case phrases that refer to the borough in free text.
    #[serde(skip)]
    pub synonyms: &'static [&'static str],
}

pub const BOROUGHS: &[Borough] = &[
    Borough {
        code: "MN",
        county_fips: "36061",
        name: "Manhattan",
        synonyms: &["manhattan", "new york county"],
    },
    Borough {
        code: "BX",
        county_fips: "36005",
        name: "Bronx",
        synonyms: &["the bronx", "bronx county", "bronx"],
    },
    Borough {
        code: "BK",
        county_fips: "36047",
        name: "Brooklyn",
        synonyms: &["brooklyn", "kings county"],
    },
    Borough {
        code: "QN",
        county_fips: "36081",
        name: "Queens",
        synonyms: &["queens county", "queens"],
    },
    Borough {
        code: "SI",
        county_fips: "36085",
        name: "Staten Island",
        synonyms: &["staten island", "richmond county"],
    },
];

/// Resolves a borough from either its two-letter code or a name/synonym.
pub fn lookup_borough(input: &str) -> Option<&'static Borough> {
    let needle = input.trim();
    BOROUGHS.iter().find(|borough| {
        borough.code.eq_ignore_ascii_case(needle)
            || borough.name.eq_ignore_ascii_case(needle)
            || borough
                .synonyms
                .iter()
                .any(|synonym| synonym.eq_ignore_ascii_case(needle))
    })
}

const FIELDS: &[FieldSpec] = &[
    FieldSpec { name: "bbl", kind: FieldKind::Text, meaning: "borough-block-lot identifier, unique per parcel" },
    FieldSpec { name: "borough", kind: FieldKind::Categorical, meaning: "two-letter borough code (MN, BX, BK, QN, SI)" },
    FieldSpec { name: "block", kind: FieldKind::Numeric, meaning: "tax block number" },
    FieldSpec { name: "lot", kind: FieldKind::Numeric, meaning: "tax lot number" },
    FieldSpec { name: "address", kind: FieldKind::Text, meaning: "street address" },
    FieldSpec { name: "zipcode", kind: FieldKind::Text, meaning: "postal code" },
    FieldSpec { name: "zonedist1", kind: FieldKind::Categorical, meaning: "primary zoning district, e.g. R6, C4-2, M1-1" },
    FieldSpec { name: "zonedist2", kind: FieldKind::Categorical, meaning: "secondary zoning district" },
    FieldSpec { name: "zonedist3", kind: FieldKind::Categorical, meaning: "third zoning district" },
    FieldSpec { name: "zonedist4", kind: FieldKind::Categorical, meaning: "fourth zoning district" },
    FieldSpec { name: "bldgclass", kind: FieldKind::Categorical, meaning: "building class code; first letter is the class family (A one-family, C/D multi-family, K retail, O office, S mixed use, V vacant)" },
    FieldSpec { name: "landuse", kind: FieldKind::Categorical, meaning: "land use category code as text ('04' mixed residential/commercial, '11' vacant land)" },
    FieldSpec { name: "limited_height_district", kind: FieldKind::Categorical, meaning: "limited height district, NULL when none applies" },
    FieldSpec { name: "ownertype", kind: FieldKind::Categorical, meaning: "owner type code ('C' city, 'P' private, 'X' tax exempt, 'O' other public)" },
    FieldSpec { name: "ownernames", kind: FieldKind::Text, meaning: "owner names (text array)" },
    FieldSpec { name: "lotarea", kind: FieldKind::Numeric, meaning: "lot area in square feet" },
    FieldSpec { name: "lotfront", kind: FieldKind::Numeric, meaning: "lot frontage in feet" },
    FieldSpec { name: "lotdepth", kind: FieldKind::Numeric, meaning: "lot depth in feet" },
    FieldSpec { name: "bldgarea", kind: FieldKind::Numeric, meaning: "total building floor area in square feet" },
    FieldSpec { name: "comarea", kind: FieldKind::Numeric, meaning: "commercial floor area in square feet" },
    FieldSpec { name: "resarea", kind: FieldKind::Numeric, meaning: "residential floor area in square feet" },
    FieldSpec { name: "officearea", kind: FieldKind::Numeric, meaning: "office floor area in square feet" },
    FieldSpec { name: "retailarea", kind: FieldKind::Numeric, meaning: "retail floor area in square feet" },
    FieldSpec { name: "numbldgs", kind: FieldKind::Numeric, meaning: "number of buildings on the lot" },
    FieldSpec { name: "numfloors", kind: FieldKind::Numeric, meaning: "number of floors of the tallest building" },
    FieldSpec { name: "unitsres", kind: FieldKind::Numeric, meaning: "residential units" },
    FieldSpec { name: "unitstotal", kind: FieldKind::Numeric, meaning: "total units" },
    FieldSpec { name: "yearbuilt", kind: FieldKind::Year, meaning: "year construction completed; 0 when unknown" },
    FieldSpec { name: "builtfar", kind: FieldKind::Numeric, meaning: "built floor-area ratio (built density); may be NULL" },
    FieldSpec { name: "residfar", kind: FieldKind::Numeric, meaning: "maximum allowed residential floor-area ratio" },
    FieldSpec { name: "commfar", kind: FieldKind::Numeric, meaning: "maximum allowed commercial floor-area ratio" },
    FieldSpec { name: "facilfar", kind: FieldKind::Numeric, meaning: "maximum allowed community facility floor-area ratio" },
    FieldSpec { name: "assessland", kind: FieldKind::Numeric, meaning: "assessed land value in dollars" },
    FieldSpec { name: "assesstot", kind: FieldKind::Numeric, meaning: "total assessed value in dollars" },
    FieldSpec { name: "exempttot", kind: FieldKind::Numeric, meaning: "total exempt value in dollars" },
    FieldSpec { name: "built_status", kind: FieldKind::Categorical, meaning: "construction status; 'vacant' for unbuilt lots" },
    FieldSpec { name: "is_vacant", kind: FieldKind::Boolean, meaning: "true when the building class starts with V or land use is '11'" },
    FieldSpec { name: "landmark", kind: FieldKind::Text, meaning: "landmark name, NULL when not a landmark" },
    FieldSpec { name: "historic_district", kind: FieldKind::Text, meaning: "historic district name, NULL when outside one" },
    FieldSpec { name: "bct2020", kind: FieldKind::Text, meaning: "2020 census tract: borough digit plus six-digit tract (7 characters)" },
    FieldSpec { name: "bctcb2020", kind: FieldKind::Text, meaning: "2020 census block: borough digit, tract and four-digit block (11 characters)" },
    FieldSpec { name: "ct2010", kind: FieldKind::Text, meaning: "2010 census tract" },
    FieldSpec { name: "cb2010", kind: FieldKind::Text, meaning: "2010 census block" },
    FieldSpec { name: "is_opportunity_zone", kind: FieldKind::Boolean, meaning: "true when the lot's census tract is a designated federal Opportunity Zone" },
    FieldSpec { name: "latitude", kind: FieldKind::Numeric, meaning: "latitude (WGS84)" },
    FieldSpec { name: "longitude", kind: FieldKind::Numeric, meaning: "longitude (WGS84)" },
];

const DERIVED: &[DerivedMetric] = &[
    DerivedMetric {
        name: "development_potential",
        sql: DEVELOPMENT_POTENTIAL_SQL,
        meaning: "unused buildable floor area in square feet",
    },
    DerivedMetric {
        name: "value_ratio",
        sql: VALUE_RATIO_SQL,
        meaning: "share of the assessment attributed to land; high values suggest an underused improvement",
    },
    DerivedMetric {
        name: "zoning_efficiency",
        sql: ZONING_EFFICIENCY_SQL,
        meaning: "fraction of the allowed density that is already built",
    },
];

#[derive(Debug, Clone, Copy, Serialize)]
pub struct SchemaDescriptor {
    pub table: &'static str,
    pub fields: &'static [FieldSpec],
    pub derived: &'static [DerivedMetric],
    pub boroughs: &'static [Borough],
}

impl SchemaDescriptor {
    pub const fn properties() -> Self {
        Self {
            table: PROPERTIES_TABLE,
            fields: FIELDS,
            derived: DERIVED,
            boroughs: BOROUGHS,
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Comma-separated list of every described column.
    pub fn field_columns_sql(&self) -> String {
        self.fields
            .iter()
            .map(|field| field.name)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// `expr AS name` list for every derived metric.
    pub fn derived_columns_sql(&self) -> String {
        self.derived
            .iter()
            .map(|metric| format!("{} AS {}", metric.sql, metric.name))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// `SELECT <columns>, <derived metrics> FROM <table>`.
    ///
    /// Columns are listed rather than `*`: the loaded table may already carry generated
    /// columns with the derived metric names, and `*` would make those names ambiguous.
    pub fn base_select(&self) -> String {
        format!(
            "SELECT {}, {} FROM {}",
            self.field_columns_sql(),
            self.derived_columns_sql(),
            self.table
        )
    }

    pub fn describe_fields(&self) -> String {
        self.fields
            .iter()
            .map(|field| format!("- {} ({}): {}", field.name, field.kind.label(), field.meaning))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn describe_derived(&self) -> String {
        self.derived
            .iter()
            .map(|metric| format!("- {} = {} -- {}", metric.name, metric.sql, metric.meaning))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn describe_boroughs(&self) -> String {
        self.boroughs
            .iter()
            .map(|borough| {
                format!(
                    "- {} => '{}' (census tract GEOIDs start with {})",
                    borough.name, borough.code, borough.county_fips
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Default for SchemaDescriptor {
    fn default() -> Self {
        Self::properties()
    }
}
