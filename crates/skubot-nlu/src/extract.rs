//! Staged metadata-filter extraction from a free-text prompt.
//!
//! Stages run in a fixed order and are cumulative: later stages only fill
//! fields the earlier ones left unset, except for the specific remap rules
//! (material tags over material, kvm ports into ports, the cable-category
//! bias) which deliberately overwrite.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

use skubot_core::{Constraint, Filter, FilterValue, NumericRange};

use crate::normalize::{
    char_similarity, lemmatize, meaningful_ngrams, normalize, token_set, words_to_number,
};
use crate::units::{length_tolerance, to_millimeters};
use crate::vocab::CatalogVocabulary;

const NUM: &str = r"\d+(?:\.\d+)?";
// No leading \b: units must also match glued to the number ("6ft", "1m").
const LEN_UNIT: &str =
    r"(?:ft|feet|foot|in(?:ch(?:es)?)?|centimeters?|centimetres?|cm|meters?|metres?|m)\b";
const NUM_WORD: &str =
    r"(?:zero|one|two|three|four|five|six|seven|eight|nine|ten|eleven|twelve)";

static NUM_UNIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"\b{NUM}\s*{LEN_UNIT}")).unwrap());

/// Comparator phrases (including common typos) or raw symbols.
static COMPARATOR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?:\bunder\b|\bbelow\b|\bless\s+(?:than|then)\b|\bno\s+less\s+(?:than|then)\b|\bnot\s+less\s+(?:than|then)\b|\bat\s*least\b|\batleast\b|\bmin(?:imum)?(?:\s+of)?\b|\bgreater\s+(?:than|then)\b|\bmore\s+(?:than|then)\b|\bover\b|\babove\b|\bat\s*most\b|\batmost\b|\bno\s+more\s+(?:than|then)\b|\bnot\s+more\s+(?:than|then)\b|\bmax(?:imum)?(?:\s+of)?\b|\bup\s*to\b|\bupto\b|\bbetween\b|\bfrom\b|\bthrough\b|\bthru\b|\bexact(?:ly)?\b|\bequal(?:s)?(?:\s+to)?\b|[<>]=?)",
    )
    .unwrap()
});

static LEN_BETWEEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?:between|from)\s*({NUM})\s*({LEN_UNIT})?\s*(?:and|to|through|thru|[-\u{{2013}}\u{{2014}}])\s*({NUM})\s*({LEN_UNIT})?"
    ))
    .unwrap()
});

static LEN_BARE_RANGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"({NUM})\s*({LEN_UNIT})?\s*(?:[-\u{{2013}}\u{{2014}}]|to|and)\s*({NUM})\s*({LEN_UNIT})?"
    ))
    .unwrap()
});

static LEN_LTE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?:<=|less than or equal to|at\s*most|atmost|no more (?:than|then)|not more (?:than|then)|up\s*to|upto|max(?:imum)?(?:\s+of)?)\s*({NUM})\s*({LEN_UNIT})"
    ))
    .unwrap()
});

static LEN_LT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?:<|less (?:than|then)|under|below)\s*({NUM})\s*({LEN_UNIT})"
    ))
    .unwrap()
});

static LEN_GTE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?:>=|greater than or equal to|at\s*least|atleast|no less (?:than|then)|not less (?:than|then)|min(?:imum)?(?:\s+of)?)\s*({NUM})\s*({LEN_UNIT})"
    ))
    .unwrap()
});

static LEN_GT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?:>|greater (?:than|then)|over|more (?:than|then)|above)\s*({NUM})\s*({LEN_UNIT})"
    ))
    .unwrap()
});

static BARE_NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"\b({NUM})\b")).unwrap());

static PACK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"\b(\d+|{NUM_WORD})\s*packs?\b")).unwrap());

static NUM_WORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"\b{NUM_WORD}\b")).unwrap());

// Global (unit-less) range grammar, first match wins per family.
static GLOBAL_BETWEEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?:between|from)\s*({NUM})\s*(?:and|to|through|thru|-)\s*({NUM})"
    ))
    .unwrap()
});
static GLOBAL_LTE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?:<=|=<|less\s+than\s+or\s+equal\s+to|at\s*most|atmost|no\s+more\s+(?:than|then)|not\s+more\s+(?:than|then)|up\s*to|upto|no\s+greater\s+(?:than|then)|max(?:imum)?(?:\s+of)?)\s*({NUM})"
    ))
    .unwrap()
});
static GLOBAL_LT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?:<|less\s+(?:than|then)|under|below)\s*({NUM})")).unwrap()
});
static GLOBAL_GTE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?:>=|=>|greater\s+than\s+or\s+equal\s+to|at\s*least|atleast|no\s+less\s+(?:than|then)|not\s+less\s+(?:than|then)|min(?:imum)?(?:\s+of)?)\s*({NUM})"
    ))
    .unwrap()
});
static GLOBAL_GT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?:>|greater\s+(?:than|then)|more\s+(?:than|then)|over|above)\s*({NUM})"
    ))
    .unwrap()
});

/// Numeric metadata fields and the prompt keywords that select them.
pub const NUMERIC_FIELD_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "ports",
        &[
            "total ports",
            "ports total",
            "ports",
            "number of ports",
            "num of ports",
            "num ports",
            "port count",
            "ports count",
        ],
    ),
    (
        "packqty",
        &[
            "in the pack",
            "in the package",
            "package quantity",
            "pack qty",
            "in a pack",
            "in a package",
        ],
    ),
    (
        "displays",
        &["displays", "monitors", "screens", "number of displays"],
    ),
    ("numharddrive", &["hard drive", "hard drives"]),
    ("kvmports", &["kvm ports", "ports kvm"]),
    (
        "cablelength",
        &["cable length", "length of cable", "cablelength", "cord length"],
    ),
];

const LENGTH_KEYWORDS: &[&str] =
    &["cable length", "length of cable", "cablelength", "cord length"];

const WIRELESS_MENTIONS: &[&str] = &["wireless", "wifi", "wi fi"];
const WIRELESS_NEGATIVES: &[&str] = &[
    "no wireless",
    "without wireless",
    "not wireless",
    "no wifi",
    "without wifi",
    "wired only",
];

/// Fields eligible for n-gram fuzzy matching.
const FUZZY_FIELDS: &[&str] = &["category", "subcategory", "interface"];

/// Categorical fields tried by the fallback matcher, in order.
const FALLBACK_FIELDS: &[&str] = &[
    "category",
    "subcategory",
    "material",
    "fiberduplex",
    "fibertype",
    "color",
    "wireless",
];

const DISPLAY_HINTS: &[&str] =
    &["display", "monitor", "screen", "hdmi", "displayport", "vga", "dvi"];
const SECURITY_HINTS: &[&str] = &["lock", "security", "secure"];
const NETWORK_HINTS: &[&str] = &["network", "ethernet", "lan"];

/// Substrings marking generic organizer/fastener/accessory values.
const GENERIC_VALUE_MARKS: &[&str] = &["organizer", "organiser", "fastener", "accessor", "tie", "clip"];

/// A fixed domain keyword that selects a category/subcategory bundle.
#[derive(Debug)]
pub struct Anchor {
    pub name: &'static str,
    triggers: &'static [&'static str],
    pub category_substr: &'static str,
    subcategory_token: &'static str,
    forbidden_subcat: &'static [&'static str],
}

/// Priority-ordered anchor table; at most one fires per prompt.
pub const ANCHORS: &[Anchor] = &[
    Anchor {
        name: "kvm",
        triggers: &["kvm"],
        category_substr: "kvm",
        subcategory_token: "kvm",
        forbidden_subcat: &[],
    },
    Anchor {
        name: "dock",
        triggers: &["dock", "docking"],
        category_substr: "dock",
        subcategory_token: "dock",
        forbidden_subcat: &["enclosure"],
    },
    Anchor {
        name: "enclosure",
        triggers: &["enclosure", "bay"],
        category_substr: "enclosure",
        subcategory_token: "enclosure",
        forbidden_subcat: &[],
    },
    Anchor {
        name: "rack",
        triggers: &["rack", "cabinet"],
        category_substr: "rack",
        subcategory_token: "rack",
        forbidden_subcat: &[],
    },
];

/// First anchor whose trigger appears as a (lemmatized) whole word.
pub fn detect_anchor(prompt_norm: &str) -> Option<&'static Anchor> {
    let words: HashSet<String> = prompt_norm.split_whitespace().map(lemmatize).collect();
    ANCHORS
        .iter()
        .find(|a| a.triggers.iter().any(|t| words.contains(*t)))
}

pub fn has_number_unit(lower: &str) -> bool {
    NUM_UNIT_RE.is_match(lower)
}

pub fn has_comparator(lower: &str) -> bool {
    COMPARATOR_RE.is_match(lower)
}

pub fn has_pack_pattern(norm: &str) -> bool {
    PACK_RE.is_match(norm)
}

pub fn has_number_word(norm: &str) -> bool {
    NUM_WORD_RE.is_match(norm)
}

fn is_generic_value(v_norm: &str) -> bool {
    GENERIC_VALUE_MARKS.iter().any(|m| v_norm.contains(m))
}

fn parse_num(s: &str) -> Option<f64> {
    s.parse().ok()
}

/// Derives a structured [`Filter`] from a raw prompt against the loaded
/// vocabulary. Returns `None` when no stage contributed a field.
pub struct FilterExtractor<'a> {
    vocab: &'a CatalogVocabulary,
}

impl<'a> FilterExtractor<'a> {
    pub fn new(vocab: &'a CatalogVocabulary) -> Self {
        Self { vocab }
    }

    pub fn extract(&self, prompt: &str) -> Option<Filter> {
        let lower = prompt.to_lowercase();
        let norm = normalize(prompt);
        let mut filter = Filter::new();

        self.stage_length(&lower, &norm, &mut filter);
        self.stage_anchor(&norm, &mut filter);
        self.stage_token_overlap(&norm, &mut filter);
        self.stage_numeric_fields(&norm, &mut filter);
        self.stage_pack_quantity(&norm, &mut filter);
        self.stage_categorical_fallback(&norm, &mut filter);
        self.stage_wireless(&norm, &mut filter);
        self.stage_material_tags(&norm, &mut filter);
        stage_merge_kvm_ports(&mut filter);
        self.stage_cable_bias(&norm, &mut filter);

        let result = filter.sanitized();
        tracing::debug!(fields = result.as_ref().map_or(0, Filter::len), "filter extracted");
        result
    }

    // Stage 1: cable length from units, comparators, or tolerance windows.
    fn stage_length(&self, lower: &str, norm: &str, filter: &mut Filter) {
        let has_len_kw = LENGTH_KEYWORDS.iter().any(|kw| norm.contains(kw));
        if !has_len_kw && !NUM_UNIT_RE.is_match(lower) {
            return;
        }

        if let Some(range) = parse_length_range(lower) {
            filter.insert("cablelength", Constraint::Range(range));
            return;
        }

        // Bare number with a unit: symmetric tolerance window around it.
        if let Some(c) = NUM_UNIT_RE.find(lower) {
            if let Some((value, unit)) = split_number_unit(c.as_str()) {
                let mm = to_millimeters(value, Some(&unit));
                let tol = length_tolerance(mm);
                filter.insert(
                    "cablelength",
                    Constraint::Range(NumericRange::between(mm - tol, mm + tol)),
                );
                return;
            }
        }

        // Length keyword but no unit anywhere: take the first bare number
        // as feet.
        if has_len_kw {
            if let Some(m) = BARE_NUMBER_RE.captures(norm) {
                if let Some(value) = parse_num(&m[1]) {
                    let mm = to_millimeters(value, Some("ft"));
                    let tol = length_tolerance(mm);
                    filter.insert(
                        "cablelength",
                        Constraint::Range(NumericRange::between(mm - tol, mm + tol)),
                    );
                }
            }
        }
    }

    // Stage 2: first matching anchor sets category/subcategory bundles.
    fn stage_anchor(&self, norm: &str, filter: &mut Filter) {
        let Some(anchor) = detect_anchor(norm) else {
            return;
        };
        let cats: Vec<String> = self
            .vocab
            .values_for("category")
            .iter()
            .map(|v| normalize(v))
            .filter(|v| v.contains(anchor.category_substr))
            .collect();
        if !cats.is_empty() {
            filter.insert("category", Constraint::AnyOf(cats));
        }
        let subcats: Vec<String> = self
            .vocab
            .values_for("subcategory")
            .iter()
            .map(|v| normalize(v))
            .filter(|v| {
                v.contains(anchor.subcategory_token)
                    && !anchor.forbidden_subcat.iter().any(|f| v.contains(f))
            })
            .collect();
        if !subcats.is_empty() {
            filter.insert("subcategory", Constraint::AnyOf(subcats));
        }
        tracing::debug!(anchor = anchor.name, "category anchor fired");
    }

    // Stage 3: token-overlap category/subcategory candidates, pruned by
    // intent hints; discarded entirely when empty or too unspecific.
    fn stage_token_overlap(&self, norm: &str, filter: &mut Filter) {
        let prompt_tokens = token_set(norm);
        if prompt_tokens.is_empty() {
            return;
        }
        let has_hint = |hints: &[&str]| hints.iter().any(|h| prompt_tokens.contains(*h));
        let display = has_hint(DISPLAY_HINTS);
        let security = has_hint(SECURITY_HINTS);
        let network = has_hint(NETWORK_HINTS);

        let keep = |v_norm: &str| -> bool {
            if is_generic_value(v_norm) {
                return false;
            }
            if display && !network && v_norm.contains("network") {
                return false;
            }
            true
        };

        let mut cat_hits: Vec<String> = Vec::new();
        for v in self.vocab.values_for("category") {
            let v_norm = normalize(v);
            if !token_set(&v_norm).is_disjoint(&prompt_tokens) && keep(&v_norm) {
                cat_hits.push(v_norm);
            }
        }
        let mut sub_hits: Vec<String> = Vec::new();
        for v in self.vocab.values_for("subcategory") {
            let v_norm = normalize(v);
            if token_set(&v_norm).is_disjoint(&prompt_tokens) || !keep(&v_norm) {
                continue;
            }
            if display && !security && (v_norm.contains("lock") || v_norm.contains("security")) {
                continue;
            }
            sub_hits.push(v_norm);
        }

        let total = cat_hits.len() + sub_hits.len();
        if total == 0 || total > 20 {
            tracing::debug!(total, "token-overlap stage discarded");
            return;
        }
        if !cat_hits.is_empty() && !filter.contains("category") {
            filter.insert("category", Constraint::AnyOf(cat_hits));
        }
        if !sub_hits.is_empty() && !filter.contains("subcategory") {
            filter.insert("subcategory", Constraint::AnyOf(sub_hits));
        }
    }

    // Stage 4: field-keyword numerics, sharing one globally parsed range.
    fn stage_numeric_fields(&self, norm: &str, filter: &mut Filter) {
        let global = parse_global_range(norm);
        for (field, keywords) in NUMERIC_FIELD_KEYWORDS {
            if *field == "cablelength" || filter.contains(field) {
                continue;
            }
            if !keywords.iter().any(|kw| norm.contains(kw)) {
                continue;
            }
            if let Some(range) = global {
                filter.insert(*field, Constraint::Range(range));
            } else if let Some(c) = find_number_near_keywords(norm, keywords) {
                filter.insert(*field, c);
            }
        }
    }

    // Stage 5: "<n> pack" sets package quantity explicitly.
    fn stage_pack_quantity(&self, norm: &str, filter: &mut Filter) {
        if let Some(m) = PACK_RE.captures(norm) {
            let n = parse_num(&m[1]).or_else(|| words_to_number(&m[1]).map(f64::from));
            if let Some(n) = n {
                filter.insert("packqty", Constraint::Eq(FilterValue::Number(n)));
            }
        }
    }

    // Stage 6: categorical fallback for still-unset fields.
    fn stage_categorical_fallback(&self, norm: &str, filter: &mut Filter) {
        for field in FALLBACK_FIELDS {
            if filter.contains(field) {
                continue;
            }
            if let Some(v) = self.match_categorical(field, norm) {
                filter.insert(*field, Constraint::Eq(FilterValue::Text(normalize(&v))));
            }
        }
    }

    fn match_categorical(&self, field: &str, prompt_norm: &str) -> Option<String> {
        let values: Vec<&String> = self
            .vocab
            .values_for(field)
            .iter()
            .filter(|v| !v.trim().is_empty())
            .collect();
        if values.is_empty() {
            return None;
        }

        if FUZZY_FIELDS.contains(&field) {
            if let Some(hit) = fuzzy_pick(&values, prompt_norm) {
                return Some(hit);
            }
        }

        // Exact substring containment of a known value.
        for v in &values {
            let v_norm = normalize(v);
            if !v_norm.is_empty() && prompt_norm.contains(&v_norm) {
                return Some((*v).clone());
            }
        }

        // Closest-string match against the whole prompt.
        let mut best: Option<(&String, f64)> = None;
        for v in &values {
            let sim = char_similarity(prompt_norm, &normalize(v));
            if sim >= 0.85 && best.map_or(true, |(_, s)| sim > s) {
                best = Some((v, sim));
            }
        }
        best.map(|(v, _)| v.clone())
    }

    // Stage 7: wireless defaults to yes when mentioned, unless negated.
    fn stage_wireless(&self, norm: &str, filter: &mut Filter) {
        if filter.contains("wireless") {
            return;
        }
        if !WIRELESS_MENTIONS.iter().any(|t| norm.contains(t)) {
            return;
        }
        let value = if WIRELESS_NEGATIVES.iter().any(|n| norm.contains(n)) {
            "no"
        } else {
            "yes"
        };
        filter.insert("wireless", Constraint::Eq(FilterValue::Text(value.into())));
    }

    // Stage 8: literal material-tag hits beat the coarser material field.
    fn stage_material_tags(&self, norm: &str, filter: &mut Filter) {
        let mut hit = false;
        for tag in self.vocab.material_tags() {
            let tag = tag.trim().to_lowercase();
            if !tag.is_empty() && norm.contains(&tag) {
                filter.insert(format!("mtag_{tag}"), Constraint::Flag(true));
                hit = true;
            }
        }
        if hit {
            filter.remove("material");
        }
    }

    // Stage 10: a length-constrained "cable" query belongs in the cable
    // categories, whatever the earlier stages guessed.
    fn stage_cable_bias(&self, norm: &str, filter: &mut Filter) {
        if !filter.contains("cablelength") {
            return;
        }
        // Substring match so "cables" counts; the lemmatizer would turn it
        // into "cabl" and miss.
        if !norm.contains("cable") {
            return;
        }
        let cats: Vec<String> = self
            .vocab
            .values_for("category")
            .iter()
            .map(|v| normalize(v))
            .filter(|v| v.contains("cable") && !is_generic_value(v))
            .collect();
        if !cats.is_empty() {
            filter.insert("category", Constraint::AnyOf(cats));
        }
        match filter.remove("subcategory") {
            Some(Constraint::AnyOf(vals)) => {
                let kept: Vec<String> =
                    vals.into_iter().filter(|v| !is_generic_value(v)).collect();
                if !kept.is_empty() {
                    filter.insert("subcategory", Constraint::AnyOf(kept));
                }
            }
            Some(Constraint::Eq(FilterValue::Text(v))) if !is_generic_value(&v) => {
                filter.insert("subcategory", Constraint::Eq(FilterValue::Text(v)));
            }
            Some(Constraint::Eq(_)) | None => {}
            Some(other) => {
                filter.insert("subcategory", other);
            }
        }
    }
}

// Stage 9: the kvmports alias folds into ports; bounds already present on
// ports win, missing kinds are taken from the alias.
fn stage_merge_kvm_ports(filter: &mut Filter) {
    let Some(kvm) = filter.remove("kvmports") else {
        return;
    };
    match (filter.remove("ports"), kvm) {
        (None, c) => filter.insert("ports", c),
        (Some(Constraint::Range(mut r)), Constraint::Range(kr)) => {
            r.merge_missing(&kr);
            filter.insert("ports", Constraint::Range(r));
        }
        (Some(existing), _) => filter.insert("ports", existing),
    }
}

/// Length range grammar over the lowercased raw prompt. Explicit two-ended
/// ranges take priority; otherwise every one-sided comparator clause in the
/// text is folded into the single tightest window.
fn parse_length_range(lower: &str) -> Option<NumericRange> {
    for re in [&*LEN_BETWEEN_RE, &*LEN_BARE_RANGE_RE] {
        if let Some(m) = re.captures(lower) {
            let a = parse_num(m.get(1)?.as_str())?;
            let b = parse_num(m.get(3)?.as_str())?;
            let unit = m.get(2).or_else(|| m.get(4))?.as_str();
            let lo = to_millimeters(a.min(b), Some(unit));
            let hi = to_millimeters(a.max(b), Some(unit));
            return Some(NumericRange::between(lo, hi));
        }
    }

    // Inclusive families run first and every matched clause is masked out
    // of the text: negated phrases embed their positive forms ("no more
    // than 10ft" contains "more than 10ft"), so the strict families must
    // only see what the inclusive ones did not consume.
    let mut text = lower.to_string();
    let mut range = NumericRange::default();
    for (re, lower_bound, inclusive) in [
        (&*LEN_LTE_RE, false, true),
        (&*LEN_GTE_RE, true, true),
        (&*LEN_LT_RE, false, false),
        (&*LEN_GT_RE, true, false),
    ] {
        let mut consumed = Vec::new();
        for m in re.captures_iter(&text) {
            let (Some(whole), Some(num), Some(unit)) = (m.get(0), m.get(1), m.get(2)) else {
                continue;
            };
            let Some(value) = parse_num(num.as_str()) else {
                continue;
            };
            let mm = to_millimeters(value, Some(unit.as_str()));
            if lower_bound {
                range.tighten_lower(mm, inclusive);
            } else {
                range.tighten_upper(mm, inclusive);
            }
            consumed.push(whole.range());
        }
        for span in consumed {
            let blank = " ".repeat(span.end - span.start);
            text.replace_range(span, &blank);
        }
    }
    if range.is_empty() {
        None
    } else {
        Some(range)
    }
}

/// Unit-less range grammar shared by the non-length numeric fields. First
/// match wins; the inclusive families are tried before the strict ones so a
/// negated comparator ("not less than 4") reads as its inclusive form.
fn parse_global_range(norm: &str) -> Option<NumericRange> {
    if let Some(m) = GLOBAL_BETWEEN_RE.captures(norm) {
        let a = parse_num(&m[1])?;
        let b = parse_num(&m[2])?;
        return Some(NumericRange::between(a.min(b), a.max(b)));
    }
    if let Some(m) = GLOBAL_LTE_RE.captures(norm) {
        return Some(NumericRange::at_most(parse_num(&m[1])?));
    }
    if let Some(m) = GLOBAL_GTE_RE.captures(norm) {
        return Some(NumericRange::at_least(parse_num(&m[1])?));
    }
    if let Some(m) = GLOBAL_LT_RE.captures(norm) {
        return Some(NumericRange::below(parse_num(&m[1])?));
    }
    if let Some(m) = GLOBAL_GT_RE.captures(norm) {
        return Some(NumericRange::above(parse_num(&m[1])?));
    }
    None
}

/// Literal number adjacent to a field keyword: "N or more X" reads as a
/// lower bound, "N or less X" as an upper bound, plain adjacency as equality.
/// Number words count as numbers.
fn find_number_near_keywords(norm: &str, keywords: &[&str]) -> Option<Constraint> {
    for kw in keywords {
        let kw_esc = regex::escape(kw);
        let patterns = [
            (format!(r"\b({NUM}|{NUM_WORD})\s+or\s+more\s+{kw_esc}\b"), Bound::Lower),
            (format!(r"\b({NUM}|{NUM_WORD})\s+or\s+less\s+{kw_esc}\b"), Bound::Upper),
            (format!(r"\b({NUM}|{NUM_WORD})\s+{kw_esc}\b"), Bound::Exact),
            (format!(r"\b{kw_esc}\s+({NUM}|{NUM_WORD})\b"), Bound::Exact),
        ];
        for (pat, bound) in patterns {
            let Ok(re) = Regex::new(&pat) else { continue };
            let Some(m) = re.captures(norm) else { continue };
            let n = parse_num(&m[1]).or_else(|| words_to_number(&m[1]).map(f64::from))?;
            return Some(match bound {
                Bound::Lower => Constraint::Range(NumericRange::at_least(n)),
                Bound::Upper => Constraint::Range(NumericRange::at_most(n)),
                Bound::Exact => Constraint::Eq(FilterValue::Number(n)),
            });
        }
    }
    None
}

enum Bound {
    Lower,
    Upper,
    Exact,
}

fn split_number_unit(s: &str) -> Option<(f64, String)> {
    let digits_end = s
        .char_indices()
        .take_while(|(_, c)| c.is_ascii_digit() || *c == '.')
        .last()
        .map(|(i, c)| i + c.len_utf8())?;
    let value = parse_num(s[..digits_end].trim())?;
    Some((value, s[digits_end..].trim().to_string()))
}

/// N-gram token-overlap scorer for category-like fields. Requires 80% of
/// the candidate's tokens covered by some prompt n-gram, plus either 60%
/// gram coverage or 0.86 character similarity.
fn fuzzy_pick(values: &[&String], prompt_norm: &str) -> Option<String> {
    let grams = meaningful_ngrams(prompt_norm);
    if grams.is_empty() {
        return None;
    }
    let mut best: Option<(String, f64)> = None;
    for v in values {
        let v_norm = normalize(v);
        let vset = token_set(&v_norm);
        if vset.is_empty() {
            continue;
        }
        for g in &grams {
            let gset = token_set(g);
            if gset.is_empty() {
                continue;
            }
            let overlap = vset.intersection(&gset).count();
            if overlap == 0 {
                continue;
            }
            let cover_v = overlap as f64 / vset.len() as f64;
            let cover_g = overlap as f64 / gset.len() as f64;
            let char_sim = char_similarity(&v_norm, g);
            if cover_v >= 0.80 && (cover_g >= 0.60 || char_sim >= 0.86) {
                let score = 0.6 * cover_v + 0.2 * cover_g + 0.2 * char_sim;
                if best.as_ref().map_or(true, |(_, s)| score > *s) {
                    best = Some(((*v).clone(), score));
                }
            }
        }
    }
    best.map(|(v, _)| v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn vocab() -> CatalogVocabulary {
        let mut values = BTreeMap::new();
        values.insert(
            "category".to_string(),
            vec![
                "Cable".to_string(),
                "Cable Organizer".to_string(),
                "Docking Station".to_string(),
                "KVM Switch".to_string(),
                "Drive Enclosure".to_string(),
                "Server Rack".to_string(),
            ],
        );
        values.insert(
            "subcategory".to_string(),
            vec![
                "HDMI Cable".to_string(),
                "Cable Tie".to_string(),
                "Laptop Dock".to_string(),
                "Dock Enclosure Combo".to_string(),
                "Laptop Lock".to_string(),
            ],
        );
        values.insert(
            "color".to_string(),
            vec!["black".to_string(), "white".to_string()],
        );
        values.insert(
            "material_tags".to_string(),
            vec!["steel".to_string(), "aluminum".to_string()],
        );
        CatalogVocabulary::from_parts(vec!["ABC123".to_string()], values)
    }

    fn range_of(filter: &Filter, field: &str) -> NumericRange {
        match filter.get(field) {
            Some(Constraint::Range(r)) => *r,
            other => panic!("expected range on {field}, got {other:?}"),
        }
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_between_range_in_feet() {
        let v = vocab();
        let f = FilterExtractor::new(&v)
            .extract("cables between 3ft and 6ft please")
            .unwrap();
        let r = range_of(&f, "cablelength");
        assert!(approx(r.gte.unwrap(), 914.4000000000001));
        assert!(approx(r.lte.unwrap(), 1828.8000000000002));
    }

    #[test]
    fn test_under_two_meters() {
        let v = vocab();
        let f = FilterExtractor::new(&v).extract("under 2m").unwrap();
        let r = range_of(&f, "cablelength");
        assert!(approx(r.lt.unwrap(), 2000.0));
        assert!(r.lower().is_none());
    }

    #[test]
    fn test_one_sided_clauses_accumulate() {
        let v = vocab();
        let f = FilterExtractor::new(&v)
            .extract("a cable more than 1ft but less than 10ft")
            .unwrap();
        let r = range_of(&f, "cablelength");
        assert!(approx(r.lower().unwrap(), 304.8));
        assert!(approx(r.upper().unwrap(), 3048.0000000000005));
    }

    #[test]
    fn test_repeated_lower_bounds_take_maximum() {
        let v = vocab();
        let f = FilterExtractor::new(&v)
            .extract("at least 2ft, ideally at least 4ft, no more than 10ft")
            .unwrap();
        let r = range_of(&f, "cablelength");
        assert!(approx(r.gte.unwrap(), 1219.2));
        assert!(approx(r.lte.unwrap(), 3048.0000000000005));
    }

    #[test]
    fn test_negated_upper_bound_stays_one_sided() {
        let v = vocab();
        let f = FilterExtractor::new(&v)
            .extract("a cable no more than 10ft")
            .unwrap();
        let r = range_of(&f, "cablelength");
        assert!(approx(r.lte.unwrap(), 3048.0000000000005));
        assert!(r.gt.is_none());
        assert!(r.contains(1000.0));
    }

    #[test]
    fn test_negated_lower_bound_stays_one_sided() {
        let v = vocab();
        let f = FilterExtractor::new(&v)
            .extract("a cable not less than 2ft")
            .unwrap();
        let r = range_of(&f, "cablelength");
        assert!(approx(r.gte.unwrap(), 609.6));
        assert!(r.lt.is_none());
        assert!(r.contains(3000.0));
    }

    #[test]
    fn test_negated_lower_bound_on_ports() {
        let v = vocab();
        let f = FilterExtractor::new(&v)
            .extract("a kvm with not less than 4 ports")
            .unwrap();
        let r = range_of(&f, "ports");
        assert!(approx(r.gte.unwrap(), 4.0));
        assert!(r.upper().is_none());
    }

    #[test]
    fn test_cable_bias_fires_for_plural_form() {
        let v = vocab();
        let f = FilterExtractor::new(&v)
            .extract("do you have cables around 1 meter")
            .unwrap();
        match f.get("category") {
            Some(Constraint::AnyOf(cats)) => {
                assert!(cats.contains(&"cable".to_string()))
            }
            other => panic!("unexpected category constraint: {other:?}"),
        }
    }

    #[test]
    fn test_bare_number_unit_gets_tolerance_window() {
        let v = vocab();
        let f = FilterExtractor::new(&v)
            .extract("do you have a cable around 1 meter")
            .unwrap();
        let r = range_of(&f, "cablelength");
        assert!(approx(r.gte.unwrap(), 975.0));
        assert!(approx(r.lte.unwrap(), 1025.0));
    }

    #[test]
    fn test_length_keyword_without_unit_assumes_feet() {
        let v = vocab();
        let f = FilterExtractor::new(&v)
            .extract("cable length 6 would be ideal")
            .unwrap();
        let r = range_of(&f, "cablelength");
        let mm = 6.0 * 304.8;
        let tol = length_tolerance(mm);
        assert!(approx(r.gte.unwrap(), mm - tol));
        assert!(approx(r.lte.unwrap(), mm + tol));
    }

    #[test]
    fn test_dock_anchor_excludes_enclosure_subcategories() {
        let v = vocab();
        let f = FilterExtractor::new(&v)
            .extract("looking for a docking station")
            .unwrap();
        match f.get("category") {
            Some(Constraint::AnyOf(cats)) => {
                assert_eq!(cats, &["docking station".to_string()])
            }
            other => panic!("unexpected category constraint: {other:?}"),
        }
        match f.get("subcategory") {
            Some(Constraint::AnyOf(subs)) => {
                assert!(subs.contains(&"laptop dock".to_string()));
                assert!(!subs.iter().any(|s| s.contains("enclosure")));
            }
            other => panic!("unexpected subcategory constraint: {other:?}"),
        }
    }

    #[test]
    fn test_kvm_ports_merge_into_ports() {
        let v = vocab();
        let f = FilterExtractor::new(&v)
            .extract("kvm with at least 4 kvm ports")
            .unwrap();
        assert!(!f.contains("kvmports"));
        let r = range_of(&f, "ports");
        assert!(approx(r.gte.unwrap(), 4.0));
    }

    #[test]
    fn test_pack_quantity_number_word() {
        let v = vocab();
        let f = FilterExtractor::new(&v).extract("a two pack of those").unwrap();
        assert_eq!(
            f.get("packqty"),
            Some(&Constraint::Eq(FilterValue::Number(2.0)))
        );
    }

    #[test]
    fn test_wireless_negation() {
        let v = vocab();
        let f = FilterExtractor::new(&v).extract("wired only, no wifi please").unwrap();
        assert_eq!(
            f.get("wireless"),
            Some(&Constraint::Eq(FilterValue::Text("no".into())))
        );
        let f = FilterExtractor::new(&v).extract("a wireless one").unwrap();
        assert_eq!(
            f.get("wireless"),
            Some(&Constraint::Eq(FilterValue::Text("yes".into())))
        );
    }

    #[test]
    fn test_material_tag_drops_material() {
        let v = vocab();
        let f = FilterExtractor::new(&v)
            .extract("a steel server rack cabinet")
            .unwrap();
        assert_eq!(f.get("mtag_steel"), Some(&Constraint::Flag(true)));
        assert!(!f.contains("material"));
    }

    #[test]
    fn test_cable_bias_overrides_category() {
        let v = vocab();
        let f = FilterExtractor::new(&v)
            .extract("do you have a cable around 1 meter")
            .unwrap();
        match f.get("category") {
            Some(Constraint::AnyOf(cats)) => {
                assert_eq!(cats, &["cable".to_string()]);
            }
            other => panic!("unexpected category constraint: {other:?}"),
        }
    }

    #[test]
    fn test_color_substring_match() {
        let v = vocab();
        let f = FilterExtractor::new(&v)
            .extract("a black docking station")
            .unwrap();
        assert_eq!(
            f.get("color"),
            Some(&Constraint::Eq(FilterValue::Text("black".into())))
        );
    }

    #[test]
    fn test_no_signal_yields_none() {
        let v = vocab();
        assert!(FilterExtractor::new(&v)
            .extract("hello how are you today")
            .is_none());
    }
}
