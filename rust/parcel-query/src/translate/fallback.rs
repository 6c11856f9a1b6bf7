//! Deterministic rule-based translator used when the language model is unavailable.
//!
//! One intent is chosen from a fixed priority list, then modifiers (borough, zoning, lot
//! size, assessed value, year built) each add a conjunct to the WHERE clause. Matched values
//! are written into the SQL text; the safety gate runs afterwards, but these literals are not
//! bound parameters.

use crate::{
    config::ROW_LIMIT_CEILING,
    descriptor::{lookup_borough, SchemaDescriptor, MAX_FAR_SQL, VALUE_RATIO_SQL},
    models::{TranslationResult, TranslationSource},
};
use once_cell::sync::Lazy;
use regex::Regex;

const UNDERDEVELOPED_RATIO: f64 = 0.5;
const LAND_VALUE_RATIO: f64 = 0.7;
const AIR_RIGHTS_MULTIPLIER: f64 = 1.5;
const LARGE_LOT_SQFT: i64 = 10_000;
const PRE_WAR_YEAR: i32 = 1945;
const HISTORIC_YEAR: i32 = 1930;
const OLD_YEAR: i32 = 1950;

fn word_regex(pattern: &str) -> Regex {
    Regex::new(&format!(r"\b(?:{pattern})\b")).expect("valid keyword regex")
}

static UNDERDEVELOPED: Lazy<Regex> = Lazy::new(|| {
    word_regex(r"under[- ]?developed|under[- ]?built|under[- ]?utili[sz]ed|development potential")
});
static VACANT: Lazy<Regex> =
    Lazy::new(|| word_regex(r"vacant|empty lots?|unbuilt|undeveloped (?:land|lots?)"));
static COMMERCIAL: Lazy<Regex> =
    Lazy::new(|| word_regex(r"commercial|retail|offices?|storefronts?|stores?"));
static RESIDENTIAL: Lazy<Regex> = Lazy::new(|| {
    word_regex(
        r"residential|homes?|houses?|housing|apartments?|condos?|single[- ]family|one[- ]family|two[- ]family|multi[- ]?family",
    )
});
static SINGLE_FAMILY: Lazy<Regex> =
    Lazy::new(|| word_regex(r"single[- ]family|one[- ]family|detached"));
static MULTI_FAMILY: Lazy<Regex> =
    Lazy::new(|| word_regex(r"multi[- ]?family|apartments?|walk[- ]?ups?|elevator buildings?"));
static MIXED_USE: Lazy<Regex> = Lazy::new(|| word_regex(r"mixed[- ]?use"));
static LAND_VALUE: Lazy<Regex> =
    Lazy::new(|| word_regex(r"land[- ]value|value ratio|land[- ]to[- ]total"));
static AIR_RIGHTS: Lazy<Regex> =
    Lazy::new(|| word_regex(r"air rights|development rights|tdrs?|transferable"));
static HISTORIC: Lazy<Regex> = Lazy::new(|| {
    word_regex(
        r"historic(?:al)?|landmarks?|pre[- ]?war|old(?:er)? (?:buildings?|properties|homes|houses)|(?:built )?before \d{4}|prior to \d{4}",
    )
});
static PRE_WAR: Lazy<Regex> = Lazy::new(|| word_regex(r"pre[- ]?war"));
static HISTORIC_KEYWORD: Lazy<Regex> = Lazy::new(|| word_regex(r"historic(?:al)?|landmarks?"));
static BEFORE_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:before|prior to|older than)\s+(\d{4})\b").expect("valid regex"));
static LARGE_LOT: Lazy<Regex> =
    Lazy::new(|| word_regex(r"(?:large|big|huge|oversized) (?:lots?|parcels?|sites?)"));

static REGION_NAME: Lazy<Regex> = Lazy::new(|| {
    word_regex(
        r"manhattan|new york county|the bronx|bronx county|bronx|brooklyn|kings county|queens county|queens|staten island|richmond county",
    )
});
static REGION_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(MN|BX|BK|QN|SI)\b").expect("valid region code regex"));
static ZONING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b([a-z]\d-?\d?)\b").expect("valid zoning regex"));
static LOT_SIZE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(over|more than|larger than|greater than|bigger than|above|at least|under|less than|smaller than|below|at most)\s+([\d,]+(?:\.\d+)?)\s*(million|thousand|k)?\s*(?:square\s+(?:feet|foot|ft)|sq\.?\s*(?:ft|feet)|sqft|sf)\b",
    )
    .expect("valid lot size regex")
});
static MONEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?:\b(under|less than|smaller than|below|at most|over|more than|larger than|greater than|bigger than|above|at least)\s+)?(\$)?\s?([\d,]+(?:\.\d+)?)\s*(million|mil|thousand|m|k)?\b",
    )
    .expect("valid money regex")
});
/// Area unit right after an amount; such amounts are lot sizes, never dollars.
static AREA_UNIT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:square\s+(?:feet|foot|ft)|sq\b|sqft\b|sf\b)").expect("valid area unit regex")
});
static YEAR_BUILT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(built after|constructed after|built since|newer than|built before|constructed before|older than)\s+(\d{4})\b")
        .expect("valid year regex")
});
static OPPORTUNITY_ZONE: Lazy<Regex> =
    Lazy::new(|| word_regex(r"(?:qualified )?opportunity zones?|qozs?|oz"));
static ROW_LIMIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:top|limit|first)\s+(\d{1,6})\b").expect("valid limit regex"));
static WORDS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[a-z0-9]+").expect("valid word regex"));

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "with", "that", "this", "find", "show", "list", "give", "get", "all",
    "any", "are", "have", "has", "from", "into", "near", "which", "where", "what", "want",
    "need", "looking", "some", "properties", "property", "please", "there",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Residential {
    SingleFamily,
    MultiFamily,
    Any,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Intent {
    Underdeveloped,
    Vacant,
    Commercial,
    Residential(Residential),
    MixedUse,
    HighLandValue,
    AirRights,
    Historic { before: i32 },
    LargeLot,
    Unrecognized,
}

/// WHERE conjuncts, ordering and limit accumulated while reading the request.
#[derive(Debug, Default)]
struct Draft {
    predicates: Vec<String>,
    clauses: Vec<String>,
    order_by: Option<&'static str>,
}

impl Draft {
    fn and(&mut self, predicate: String, clause: String) {
        self.predicates.push(predicate);
        self.clauses.push(clause);
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackTranslator {
    descriptor: SchemaDescriptor,
}

impl FallbackTranslator {
    pub fn new(descriptor: SchemaDescriptor) -> Self {
        Self { descriptor }
    }

    pub fn translate(&self, text: &str) -> TranslationResult {
        let lower = text.to_lowercase();
        let intent = detect_intent(&lower);

        let mut draft = Draft::default();
        let phrase = apply_intent(intent, &mut draft);
        let intent_predicates = draft.predicates.len();

        apply_region(text, &lower, &mut draft);
        apply_zoning(&lower, &mut draft);
        apply_lot_size(&lower, &mut draft);
        apply_money(&lower, &mut draft);
        apply_year_built(&lower, intent, &mut draft);
        apply_opportunity_zone(&lower, &mut draft);

        let limit = requested_limit(&lower);
        let sql = self.render(&draft, limit);

        let mut explanation = format!(
            "{phrase}{}.",
            draft.clauses[intent_predicates..].concat()
        );
        if let Some(order) = draft.order_by {
            explanation.push_str(&format!(" Sorted by {}.", describe_order(order)));
        }
        if intent == Intent::Unrecognized {
            explanation.push_str(&describe_keywords(&lower));
        }
        if limit < ROW_LIMIT_CEILING {
            explanation.push_str(&format!(" Showing up to {limit} results."));
        }

        TranslationResult {
            sql,
            explanation,
            source: TranslationSource::Fallback,
        }
    }

    fn render(&self, draft: &Draft, limit: i64) -> String {
        let mut sql = self.descriptor.base_select();
        if !draft.predicates.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&draft.predicates.join(" AND "));
        }
        if let Some(order) = draft.order_by {
            sql.push_str(" ORDER BY ");
            sql.push_str(order);
        }
        sql.push_str(&format!(" LIMIT {limit}"));
        sql
    }
}

fn detect_intent(lower: &str) -> Intent {
    if UNDERDEVELOPED.is_match(lower) {
        Intent::Underdeveloped
    } else if VACANT.is_match(lower) {
        Intent::Vacant
    } else if COMMERCIAL.is_match(lower) {
        Intent::Commercial
    } else if RESIDENTIAL.is_match(lower) {
        let kind = if SINGLE_FAMILY.is_match(lower) {
            Residential::SingleFamily
        } else if MULTI_FAMILY.is_match(lower) {
            Residential::MultiFamily
        } else {
            Residential::Any
        };
        Intent::Residential(kind)
    } else if MIXED_USE.is_match(lower) {
        Intent::MixedUse
    } else if LAND_VALUE.is_match(lower) {
        Intent::HighLandValue
    } else if AIR_RIGHTS.is_match(lower) {
        Intent::AirRights
    } else if HISTORIC.is_match(lower) {
        Intent::Historic {
            before: historic_threshold(lower),
        }
    } else if LARGE_LOT.is_match(lower) {
        Intent::LargeLot
    } else {
        Intent::Unrecognized
    }
}

fn historic_threshold(lower: &str) -> i32 {
    let explicit = BEFORE_YEAR
        .captures(lower)
        .and_then(|caps| caps[1].parse::<i32>().ok());
    match explicit {
        Some(year) => year,
        None if PRE_WAR.is_match(lower) => PRE_WAR_YEAR,
        None if HISTORIC_KEYWORD.is_match(lower) => HISTORIC_YEAR,
        None => OLD_YEAR,
    }
}

/// Adds the intent's base predicate and ordering, and returns the opening phrase of the
/// explanation.
fn apply_intent(intent: Intent, draft: &mut Draft) -> String {
    let (predicate, order_by, phrase) = match intent {
        Intent::Underdeveloped => (
            Some(format!(
                "(builtfar < {MAX_FAR_SQL} * {UNDERDEVELOPED_RATIO} OR builtfar IS NULL)"
            )),
            Some("development_potential DESC NULLS LAST"),
            "Finding underdeveloped properties built to less than half of their allowed density"
                .to_string(),
        ),
        Intent::Vacant => (
            Some("(built_status = 'vacant' OR is_vacant = true)".to_string()),
            None,
            "Finding vacant lots".to_string(),
        ),
        Intent::Commercial => (
            Some("LEFT(bldgclass, 1) IN ('K', 'O', 'L')".to_string()),
            None,
            "Finding commercial properties (retail, office and loft building classes)".to_string(),
        ),
        Intent::Residential(Residential::SingleFamily) => (
            Some("LEFT(bldgclass, 1) = 'A'".to_string()),
            None,
            "Finding single-family homes".to_string(),
        ),
        Intent::Residential(Residential::MultiFamily) => (
            Some("LEFT(bldgclass, 1) IN ('C', 'D')".to_string()),
            None,
            "Finding multi-family residential buildings".to_string(),
        ),
        Intent::Residential(Residential::Any) => (
            Some("LEFT(bldgclass, 1) IN ('A', 'B', 'C', 'D', 'R')".to_string()),
            None,
            "Finding residential properties".to_string(),
        ),
        Intent::MixedUse => (
            Some("(LEFT(bldgclass, 1) = 'S' OR landuse = '04')".to_string()),
            None,
            "Finding mixed-use properties".to_string(),
        ),
        Intent::HighLandValue => (
            Some(format!("{VALUE_RATIO_SQL} > {LAND_VALUE_RATIO}")),
            Some("value_ratio DESC NULLS LAST"),
            "Finding properties where land accounts for more than 70% of the assessed value"
                .to_string(),
        ),
        Intent::AirRights => (
            Some(format!("{MAX_FAR_SQL} > builtfar * {AIR_RIGHTS_MULTIPLIER}")),
            Some("development_potential DESC NULLS LAST"),
            "Finding properties with unused air rights (allowed density over 1.5 times the built density)"
                .to_string(),
        ),
        Intent::Historic { before } => (
            Some(format!("yearbuilt < {before} AND yearbuilt > 0")),
            Some("yearbuilt ASC"),
            format!("Finding buildings built before {before}"),
        ),
        Intent::LargeLot => (
            Some(format!("lotarea > {LARGE_LOT_SQFT}")),
            Some("lotarea DESC NULLS LAST"),
            format!(
                "Finding large lots over {} square feet",
                with_thousands(LARGE_LOT_SQFT as f64)
            ),
        ),
        Intent::Unrecognized => (None, None, "Showing properties".to_string()),
    };

    if let Some(predicate) = predicate {
        draft.and(predicate, String::new());
    }
    draft.order_by = order_by;
    phrase
}

fn apply_region(original: &str, lower: &str, draft: &mut Draft) {
    let borough = REGION_NAME
        .find(lower)
        .and_then(|m| lookup_borough(m.as_str()))
        .or_else(|| {
            REGION_CODE
                .find(original)
                .and_then(|m| lookup_borough(m.as_str()))
        });

    if let Some(borough) = borough {
        draft.and(
            format!("borough = '{}'", borough.code),
            format!(" in {}", borough.name),
        );
    }
}

fn apply_zoning(lower: &str, draft: &mut Draft) {
    if let Some(caps) = ZONING.captures(lower) {
        let district = caps[1].to_uppercase();
        draft.and(
            format!("zonedist1 LIKE '{district}%'"),
            format!(" zoned {district}"),
        );
    }
}

fn apply_lot_size(lower: &str, draft: &mut Draft) {
    let Some(caps) = LOT_SIZE.captures(lower) else {
        return;
    };
    let Some(amount) = parse_number(&caps[2]) else {
        return;
    };
    let value = amount * unit_multiplier(caps.get(3).map(|m| m.as_str()));
    let (op, words) = comparison(&caps[1]);
    draft.and(
        format!("lotarea {op} {}", sql_number(value)),
        format!(" with lot area {words} {} square feet", with_thousands(value)),
    );
}

fn apply_money(lower: &str, draft: &mut Draft) {
    for caps in MONEY.captures_iter(lower) {
        let has_dollar = caps.get(2).is_some();
        let unit = caps.get(4).map(|m| m.as_str());
        if !has_dollar && unit.is_none() {
            continue;
        }
        let end = caps.get(0).map_or(lower.len(), |m| m.end());
        if AREA_UNIT.is_match(&lower[end..]) {
            continue;
        }
        let Some(amount) = parse_number(&caps[3]) else {
            return;
        };
        let value = amount * unit_multiplier(unit);
        let (op, words) = caps
            .get(1)
            .map(|m| comparison(m.as_str()))
            .unwrap_or(("<", "under"));
        draft.and(
            format!("assesstot {op} {}", sql_number(value)),
            format!(" with total assessed value {words} ${}", with_thousands(value)),
        );
        return;
    }
}

fn apply_year_built(lower: &str, intent: Intent, draft: &mut Draft) {
    let Some(caps) = YEAR_BUILT.captures(lower) else {
        return;
    };
    let Ok(year) = caps[2].parse::<i32>() else {
        return;
    };
    let newer = matches!(
        &caps[1],
        "built after" | "constructed after" | "built since" | "newer than"
    );
    if newer {
        draft.and(format!("yearbuilt > {year}"), format!(" built after {year}"));
    } else if !matches!(intent, Intent::Historic { .. }) {
        draft.and(
            format!("yearbuilt < {year} AND yearbuilt > 0"),
            format!(" built before {year}"),
        );
    }
}

fn apply_opportunity_zone(lower: &str, draft: &mut Draft) {
    if OPPORTUNITY_ZONE.is_match(lower) {
        draft.and(
            "is_opportunity_zone = true".to_string(),
            " inside an Opportunity Zone".to_string(),
        );
    }
}

fn requested_limit(lower: &str) -> i64 {
    ROW_LIMIT
        .captures(lower)
        .and_then(|caps| caps[1].parse::<i64>().ok())
        .filter(|limit| *limit > 0)
        .map_or(ROW_LIMIT_CEILING, |limit| limit.min(ROW_LIMIT_CEILING))
}

fn unit_multiplier(unit: Option<&str>) -> f64 {
    match unit {
        Some("million" | "mil" | "m") => 1_000_000.0,
        Some("thousand" | "k") => 1_000.0,
        _ => 1.0,
    }
}

fn comparison(words: &str) -> (&'static str, &'static str) {
    match words {
        "at least" => (">=", "at least"),
        "at most" => ("<=", "at most"),
        "under" | "less than" | "smaller than" | "below" => ("<", "under"),
        _ => (">", "over"),
    }
}

fn describe_order(order: &str) -> &'static str {
    match order.split_whitespace().next() {
        Some("development_potential") => "development potential, highest first",
        Some("value_ratio") => "land value ratio, highest first",
        Some("yearbuilt") => "year built, oldest first",
        Some("lotarea") => "lot area, largest first",
        _ => "relevance",
    }
}

fn describe_keywords(lower: &str) -> String {
    let mut keywords: Vec<&str> = Vec::new();
    for word in WORDS.find_iter(lower).map(|m| m.as_str()) {
        if word.len() >= 3
            && !word.chars().all(|c| c.is_ascii_digit())
            && !STOPWORDS.contains(&word)
            && !keywords.contains(&word)
        {
            keywords.push(word);
        }
    }

    if keywords.is_empty() {
        " No specific property type was recognized, so no type filter was applied.".to_string()
    } else {
        format!(
            " No specific property type was recognized from the keywords: {}.",
            keywords.join(", ")
        )
    }
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.replace(',', "")
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

fn sql_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

fn with_thousands(value: f64) -> String {
    let rendered = sql_number(value);
    let (int_part, frac_part) = match rendered.split_once('.') {
        Some((int_part, frac)) => (int_part.to_string(), Some(frac.to_string())),
        None => (rendered, None),
    };

    let digits: Vec<char> = int_part.chars().collect();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.iter().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 && ch.is_ascii_digit() {
            grouped.push(',');
        }
        grouped.push(*ch);
    }

    match frac_part {
        Some(frac) => format!("{grouped}.{frac}"),
        None => grouped,
    }
}
