//! Canned reply texts for turns that never reach the language model.

pub const GREETING: &str = "Hi there! I’m here to help you find the right StarTech.com product. \
    Tell me what you’re trying to do or ask about a specific product number.";

pub const FAREWELL: &str =
    "Thanks for chatting! If you need anything else about StarTech.com products, just ask.";

pub const CLARIFICATION: &str = "Could you tell me a bit more about what you're looking for? For example:\n\
    - Is there a specific problem you are trying to solve?\n\
    - What specs in a product are important to you?\n\
    - What do you want the product to connect to or be compatible with?\n\n\
    You can also mention a product number if you already have one in mind.";

pub const NO_MATCH: &str = "I couldn’t find a product that meets that requirement. \
    If you can adjust it, I’ll try again.";

pub const NO_CONTEXT: &str = "I couldn’t find a specific match yet. If you share a product number \
    or more detail (e.g., interface, length, color), I’ll pull the exact specs.";

const INSTALL_BASE: &str = "I can help with product selection, specs, and compatibility. \
    For installation, configuration, or troubleshooting, \
    please refer to the official documentation or contact StarTech.com Technical Support.";

/// Deflection for install/troubleshooting asks, echoing the focused product
/// when one exists.
pub fn install_deflection(sku: Option<&str>) -> String {
    match sku {
        Some(pn) => format!(
            "{INSTALL_BASE}\n\nIf you share more about your setup, I can confirm whether **{pn}** fits your needs."
        ),
        None => INSTALL_BASE.to_string(),
    }
}
