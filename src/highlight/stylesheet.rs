//! Stylesheet injected into the chrome for the highlight overlay.

use crate::config::HighlightConfig;

/// Class carried by every highlight overlay element.
pub const OVERLAY_CLASS: &str = "findglow-box";

/// Attribute toggled to run the pulse animation.
pub const ACTIVE_ATTRIBUTE: &str = "active";

/// Build the overlay rules: a bordered box, and a keyframe animation
/// sweeping opacity back and forth for as long as the box is active.
pub fn pulse_stylesheet(config: &HighlightConfig) -> String {
    let name = &config.animation_name;
    let period_ms = config.pulse_period().as_millis();

    format!(
        "@keyframes {name} {{\n\
         \x20 from {{ opacity: {low}; }}\n\
         \x20 to {{ opacity: {high}; }}\n\
         }}\n\
         .{class} {{\n\
         \x20 box-sizing: border-box;\n\
         \x20 pointer-events: none;\n\
         \x20 border: {outer}px solid {color};\n\
         \x20 box-shadow: inset 0 0 0 {inner}px {color};\n\
         \x20 opacity: {high};\n\
         }}\n\
         .{class}[{active}] {{\n\
         \x20 animation: {name} {period_ms}ms ease-in-out infinite alternate;\n\
         }}\n",
        name = name,
        low = config.opacity_low,
        high = config.opacity_high,
        class = OVERLAY_CLASS,
        active = ACTIVE_ATTRIBUTE,
        outer = config.border.outer,
        inner = config.border.inner,
        color = config.border_color,
        period_ms = period_ms,
    )
}
