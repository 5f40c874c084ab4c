//! Row-to-record transforms: value cleaning, text rendering, and the three
//! metadata tiers (numerics, categoricals, derived flags and port counts).

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};

/// Rendered/indexed columns in output order, with their display labels.
/// The spreadsheet is expected to carry these headers already merged.
pub const FIELD_LABELS: &[(&str, &str)] = &[
    ("Material", "Material"),
    ("FIBERDUPLEX", "Fiber Duplex"),
    ("FIBERTYPE", "Fiber Type"),
    ("MAXDATARATE", "Max Data Transfer Rate"),
    ("Max Distance", "Max Distance"),
    ("MTBF", "MTBF (Mean Time Between Failures)"),
    ("Ethernet Speed", "Ethernet Speed"),
    ("PACKQTY", "Package Quantity"),
    ("POWERCONSUMPTION", "Power Consumption (Watts)"),
    ("WARRANTY", "Warranty Period"),
    ("WAVELENGTH", "Wavelength"),
    ("ZCONTENTITEM", "Included in Package"),
    ("INTERFACEA", "Connector A"),
    ("INTERFACEB", "Connector B"),
    ("WIRELESS", "Wireless Capability"),
    ("OUTPUTVOLTS", "Output Voltage"),
    ("COLOR", "Color"),
    ("HUMIDITY", "Humidity"),
    ("INPUTAMPS", "Input Current"),
    ("INPUTVOLTS", "Input Voltage"),
    ("OPERATINGTEMP", "Operating Temperature"),
    ("OUTPUTAMP", "Output Current"),
    ("PLUGTYPE", "Plug Type"),
    ("STANDARDS", "Industry Standards"),
    ("STORAGETEMP", "Storage Temperature"),
    ("BUSTYPE", "Bus Type"),
    ("CHIPID", "Chipset ID"),
    ("DOCK4KSUPPORT", "4K Display Support"),
    ("DOCKFASTCHARGE", "Fast Charge Ports"),
    ("EXTERNALPORTS", "External Ports"),
    ("HOSTCONNECTOR", "Host Connectors"),
    ("Interface", "Interface"),
    ("K_LOCK_SLOT", "Compatible Lock Slot"),
    ("LED", "LED Indicators"),
    ("MAXDVIRESOLUTION", "Maximum Digital Resolution"),
    ("OSCOMPATIBILITY", "OS Compatibility"),
    ("POWERADAPTER", "Power Source"),
    ("POWERDELIVERY", "Power Delivery"),
    ("Ports", "Ports"),
    ("UASP_YN", "UASP Support"),
    ("USBTYPE", "Type and Rate"),
    ("WAKEONLAN", "Wake On Lan"),
    ("CABLELENGTH", "Cable Length"),
    ("FULLDUPLEX", "Full Duplex"),
    ("AVINPUT", "AV Input"),
    ("AVOUTPUT", "AV Output"),
    ("MEMORY", "Memory"),
    ("SUPRESOLUTIONS", "Supported Resolutions"),
    ("USBPASSTHRU", "USB Passthrough"),
    ("WIDESCREEN", "Wide Screen Supported"),
    ("KVMAUDIO", "Audio"),
    ("CONNPLATING", "Connector Plating"),
    ("FIRERATING", "Fire Rating"),
    ("JACKETTYPE", "Cable Jacket Material"),
    ("NWCABLETYPE", "Cable Type"),
    ("SHIELDTYPE", "Cable Shield Material"),
    ("WIREGUAGE", "Wire Gauge"),
    ("AUTOMDIX", "Auto MDIX"),
    ("POWERADAPTERPOL", "Center Tip Polarity"),
    ("CARDPROFILE", "Card Type"),
    ("CONNTYPE", "Connector Type"),
    ("INTERNALPORTS", "Internal Ports"),
    ("PORTSTYLE", "Port Style"),
    ("ANTITHEFT", "Security Slot Support"),
    ("CURVEDTV", "Curved TV Compatible"),
    ("FLATPACK", "Flat Pack (Assembly Required)"),
    ("MAXDISPLAYSIZE", "Maximum Display Size"),
    ("MINDISPLAYSIZE", "Minimum Display Size"),
    ("Mounting Options", "Mounting Options"),
    ("VESAPATTERN", "VESA Hole Patterns"),
    ("VIDEOWALL", "Video Wall"),
    ("MAXRESOLUTION", "Maximum Analog Resolution"),
    ("ASPECTRATIO", "Aspect Ratio"),
    ("UHEIGHT", "U Height"),
    ("WALLMOUNT_YN", "Wall Mountable"),
    ("DRIVECONNECTOR", "Drive Connectors"),
    ("MEDIATYPE", "Memory Media Type"),
    ("HARDDRIVECOM", "Compatible Drive Types"),
    ("INSERTIONRATE", "Insertion Rating"),
    ("NUMHARDDRIVE", "Number of Hard Drives"),
    ("CONNSTYLE", "Connector Style"),
    ("NUMBERCONDUCTORS", "Number of Conductors"),
    ("DRIVESIZE", "Drive Size"),
    ("FRAMETYPE", "Frame Type"),
    ("AVCABLING", "Cabling"),
    ("KVMCASCADABLE", "Daisy-Chain"),
    ("RATING", "Cable Rating"),
    ("LOCALCONNECTORS", "Local Unit Connectors"),
    ("LADDERTYPE", "Mounting Rail Profile"),
    ("RACKTYPE", "Rack Type"),
    ("CONDUCTORTYPE", "Conductor Type"),
    ("HOT_KEYS", "Hot-Key Selection"),
    ("KVMCABLESINCLUDE", "KVM Cables Included"),
    ("MOUNTHOLETYPE", "Mounting Hole Type"),
    ("KVMCONCONSOLE", "Console Interface"),
    ("KVMIPCONTROL", "IP Control"),
    ("KVMPCVIDEO", "PC Video Type"),
    ("OSDSUPPORT", "On-Screen Display"),
    ("WIRED", "Wiring Standard"),
    ("WHQL", "Microsoft WHQL Certified"),
    ("DRIVECAPACITY", "Max Drive Capacity"),
    ("POE_YN", "PoE"),
    ("WDM_YN", "WDM"),
    ("DUPEMODES", "Duplication Modes"),
    ("MAXUSERS", "Max Users"),
    ("ERASE_MODES", "Erase Modes"),
    ("Package Height", "Package Height"),
    ("Package Length", "Package Length"),
    ("Package Width", "Package Width"),
    ("Product Height", "Product Height"),
    ("Product Length", "Product Length"),
    ("Product Width", "Product Width"),
    ("Shipping (Package) Weight", "Shipping Weight"),
    ("Weight of Product", "Product Weight"),
    ("Category", "Product Category"),
    ("Sub Category", "Product Subcategory"),
    ("Displays", "Number of Displays"),
];

/// Categorical metadata keys and their source columns.
pub const CATEGORICAL_COLUMNS: &[(&str, &str)] = &[
    ("category", "Category"),
    ("subcategory", "Sub Category"),
    ("material", "Material"),
    ("fiberduplex", "FIBERDUPLEX"),
    ("fibertype", "FIBERTYPE"),
    ("color", "COLOR"),
    ("wireless", "WIRELESS"),
    ("interface", "Interface"),
    ("mounting_options", "Mounting Options"),
];

/// Connector/package columns kept as raw text, never numeric-parsed.
const TEXT_ONLY_FIELDS: &[&str] = &[
    "CONNTYPE",
    "EXTERNALPORTS",
    "HOSTCONNECTOR",
    "INTERFACEA",
    "INTERFACEB",
    "ZCONTENTITEM",
];

/// Length-like fields stored in millimeters and rendered dual-unit.
const PRETTY_MM_FIELDS: &[&str] = &[
    "CABLELENGTH",
    "Package Height",
    "Package Length",
    "Package Width",
    "Product Height",
    "Product Length",
    "Product Width",
];

/// Weight fields stored in grams and rendered dual-unit.
const PRETTY_WEIGHT_FIELDS: &[&str] = &["Shipping (Package) Weight", "Weight of Product"];

#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Number(f64),
    Text(String),
}

/// One spreadsheet row keyed by normalized header.
#[derive(Debug, Clone, Default)]
pub struct RawRow {
    cells: HashMap<String, CellValue>,
}

impl RawRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, column: impl Into<String>, value: CellValue) {
        self.cells.insert(column.into(), value);
    }

    pub fn set_text(&mut self, column: impl Into<String>, value: impl Into<String>) {
        self.set(column, CellValue::Text(value.into()));
    }

    pub fn set_number(&mut self, column: impl Into<String>, value: f64) {
        self.set(column, CellValue::Number(value));
    }

    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.cells.get(column)
    }

    pub fn text(&self, column: &str) -> Option<&str> {
        match self.cells.get(column) {
            Some(CellValue::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Uppercased, trimmed SKU; `None` when blank or missing.
    pub fn sku(&self) -> Option<String> {
        let raw = match self.cells.get("Product Number") {
            Some(CellValue::Text(s)) => s.trim().to_string(),
            Some(CellValue::Number(n)) => format!("{n}"),
            None => return None,
        };
        if raw.is_empty() {
            None
        } else {
            Some(raw.to_uppercase())
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CleanValue {
    Number(f64),
    Text(String),
}

static NUM_WITH_SEPARATORS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[-+]?\d{1,3}(?:,\d{3})+(?:\.\d+)?|[-+]?\d+(?:\.\d+)?").unwrap()
});

/// Clean a raw cell for one field: text-only columns stay verbatim, numbers
/// are extracted from annotated strings, and CABLELENGTH values quoted in
/// other units are normalized to millimeters.
pub fn clean_value(field: &str, raw: &CellValue) -> Option<CleanValue> {
    if TEXT_ONLY_FIELDS.contains(&field) {
        let s = match raw {
            CellValue::Text(s) => s.trim().to_string(),
            CellValue::Number(n) => format_number(*n),
        };
        return (!s.is_empty()).then_some(CleanValue::Text(s));
    }

    match raw {
        CellValue::Number(n) => Some(CleanValue::Number(*n)),
        CellValue::Text(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            // known data glitch in the source sheet
            if field == "PACKQTY" && s == "1, 1" {
                return Some(CleanValue::Number(1.0));
            }
            if let Ok(n) = s.parse::<f64>() {
                return Some(CleanValue::Number(n));
            }
            if let Some(m) = NUM_WITH_SEPARATORS_RE.find(s) {
                if let Ok(mut n) = m.as_str().replace(',', "").parse::<f64>() {
                    if field == "CABLELENGTH" {
                        n *= cable_length_unit_factor(s);
                    }
                    return Some(CleanValue::Number(n));
                }
            }
            Some(CleanValue::Text(s.to_string()))
        }
    }
}

fn cable_length_unit_factor(s: &str) -> f64 {
    static M_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?i)\b(?:m|meters?|metres?)\b").unwrap());
    static IN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(?:in|inch|inches)\b").unwrap());
    static FT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(?:ft|foot|feet)\b").unwrap());
    static CM_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?i)\b(?:cm|centimeters?|centimetres?)\b").unwrap());
    if M_RE.is_match(s) {
        1000.0
    } else if IN_RE.is_match(s) {
        25.4
    } else if FT_RE.is_match(s) {
        304.8
    } else if CM_RE.is_match(s) {
        10.0
    } else {
        1.0
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

fn fmt_one_decimal(n: f64) -> String {
    let s = format!("{n:.1}");
    s.strip_suffix(".0").map(str::to_string).unwrap_or(s)
}

/// Dual-unit length rendering for stored millimeter values.
pub fn format_cable_length(mm: f64) -> String {
    if mm <= 300.0 {
        let inches = mm / 25.4;
        let cm = (mm / 10.0).round() as i64;
        format!("{}in [{cm}cm]", fmt_one_decimal(inches))
    } else {
        let feet = (mm / 304.8 * 10.0).round() / 10.0;
        let meters = (mm / 1000.0 * 10.0).round() / 10.0;
        format!("{}ft [{}m]", fmt_one_decimal(feet), fmt_one_decimal(meters))
    }
}

/// Dual-unit weight rendering for stored gram values.
pub fn format_weight_grams(g: f64) -> String {
    if g <= 454.0 {
        let oz = (g / 28.349_523_125).round() as i64;
        format!("{oz} oz [{} g]", g.round() as i64)
    } else {
        let lbs = g / 453.592_37;
        let kg = g / 1000.0;
        format!("{} lbs [{} kg]", fmt_one_decimal((lbs * 10.0).round() / 10.0), fmt_one_decimal((kg * 10.0).round() / 10.0))
    }
}

/// Split a material description into reusable tags ("steel and plastic"
/// yields both), order-preserving and de-duplicated.
pub fn material_tokens(s: &str) -> Vec<String> {
    static SPLIT_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"\b(?:and|or)\b|[/,&+]").unwrap());
    let lowered = s.to_lowercase().replace('-', " ");
    let mut out: Vec<String> = Vec::new();
    for part in SPLIT_RE.split(&lowered) {
        let cleaned = part.split_whitespace().collect::<Vec<_>>().join(" ");
        if !cleaned.is_empty() && !out.contains(&cleaned) {
            out.push(cleaned);
        }
    }
    out
}

static PORT_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    vec![
        ("usb_c_ports", Regex::new(r"(?i)\b(?:usb[\s-]?c|type[\s-]?c)\b").unwrap()),
        ("usb_a_ports", Regex::new(r"(?i)\b(?:usb[\s-]?a|type[\s-]?a)\b").unwrap()),
        ("hdmi_ports", Regex::new(r"(?i)\bhdmi\b").unwrap()),
        ("dp_ports", Regex::new(r"(?i)\b(?:display\s*port|displayport|dp)\b").unwrap()),
        ("vga_ports", Regex::new(r"(?i)\bvga\b").unwrap()),
    ]
});

static MULT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)\(\s*x\s*(\d+)\s*\)").unwrap(),
        Regex::new(r"(?i)\u{d7}\s*(\d+)").unwrap(),
        Regex::new(r"(?i)\b(\d+)\s*x\b").unwrap(),
    ]
});

static SEGMENT_SPLIT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[;,\n/]").unwrap());
static SEGMENT_COUNT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(\d+)\s*(?:ports?|x)?\b").unwrap());

/// Count ports of one connector family in a free-text connector column.
/// Each matching segment contributes its explicit multiplier ("(x2)", "2x"),
/// else its first count, else one.
pub fn count_ports(text: &str, port_regex: &Regex) -> Option<u32> {
    if text.trim().is_empty() {
        return None;
    }
    let mut total = 0u32;
    for seg in SEGMENT_SPLIT_RE.split(text) {
        if !port_regex.is_match(seg) {
            continue;
        }
        let mut mult = 0u32;
        for pat in MULT_PATTERNS.iter() {
            if let Some(m) = pat.captures(seg) {
                if let Ok(n) = m[1].parse::<u32>() {
                    mult = mult.max(n);
                }
            }
        }
        if mult > 0 {
            total += mult;
            continue;
        }
        let count = SEGMENT_COUNT_RE
            .captures(seg)
            .and_then(|m| m[1].parse::<u32>().ok())
            .unwrap_or(1);
        total += count;
    }
    (total > 0).then_some(total)
}

fn normalized_categorical(row: &RawRow, column: &str) -> Option<String> {
    let raw = match row.get(column)? {
        CellValue::Text(s) => s.trim().to_lowercase(),
        CellValue::Number(n) => format_number(*n),
    };
    (!raw.is_empty()).then_some(raw)
}

/// Render one row as ordered `Label: value` lines, lengths and weights in
/// dual units.
pub fn row_to_text(row: &RawRow) -> String {
    let mut lines = vec![format!(
        "Product Number: {}",
        row.sku().unwrap_or_default()
    )];
    for (field, label) in FIELD_LABELS {
        let Some(raw) = row.get(field) else { continue };
        let Some(value) = clean_value(field, raw) else { continue };
        let rendered = match value {
            CleanValue::Number(n) if PRETTY_MM_FIELDS.contains(field) => format_cable_length(n),
            CleanValue::Number(n) if PRETTY_WEIGHT_FIELDS.contains(field) => {
                format_weight_grams(n)
            }
            CleanValue::Number(n) => format_number(n),
            CleanValue::Text(s) => s,
        };
        lines.push(format!("{label}: {rendered}"));
    }
    lines.join("\n")
}

/// Build the metadata tiers for one row.
pub fn build_metadata(row: &RawRow) -> serde_json::Map<String, Value> {
    let mut meta = serde_json::Map::new();
    meta.insert(
        "product_number".into(),
        json!(row.sku().unwrap_or_default()),
    );

    // numeric tier
    for (field, _) in FIELD_LABELS {
        if let Some(raw) = row.get(field) {
            if let Some(CleanValue::Number(n)) = clean_value(field, raw) {
                meta.insert(field.to_lowercase(), json!(n));
            }
        }
    }

    // categorical tier
    for (meta_key, column) in CATEGORICAL_COLUMNS {
        if let Some(v) = normalized_categorical(row, column) {
            meta.insert((*meta_key).to_string(), json!(v));
        }
    }

    // material tags and flags
    if let Some(material) = row.text("Material") {
        let tags = material_tokens(material);
        if !tags.is_empty() {
            for t in &tags {
                meta.insert(format!("mtag_{t}"), json!(true));
            }
            meta.insert("material_tags".into(), json!(tags));
        }
    }

    // derived per-connector port counts; take the best source column
    for (key, rx) in PORT_PATTERNS.iter() {
        let mut best = 0u32;
        for column in ["CONNTYPE", "EXTERNALPORTS", "HOSTCONNECTOR"] {
            if let Some(text) = row.text(column) {
                if let Some(c) = count_ports(text, rx) {
                    best = best.max(c);
                }
            }
        }
        if best > 0 {
            meta.insert((*key).to_string(), json!(f64::from(best)));
        }
    }

    meta
}
