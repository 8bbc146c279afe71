//! Capture region and the print style override pass.
//!
//! A `CaptureRegion` is the on-screen subtree that gets exported. Before it is
//! rasterized, a detached clone is restyled for print: non-printable elements
//! are hidden and text is forced to black. The live tree is never touched by
//! this pass; `prepare_clone` only borrows the region immutably.

use crate::dom::{walk_elements, NodeIndex, StyledTree};
use crate::{Error, Result};
use scraper::{Html, Selector};

/// Element id of the results panel
pub const DEFAULT_TARGET_ID: &str = "results-to-export";

/// Colour written by `OverrideAction::ForceColor`
pub const PRINT_TEXT_COLOR: &str = "#000000";

/// What to do with elements matched by an override selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideAction {
    /// Mark the element non-rendering (`display: none`)
    Hide,
    /// Force the foreground (and SVG text fill) to black and clear backgrounds
    ForceColor,
}

/// A single `{selector, action}` print rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleOverride {
    pub selector: String,
    pub action: OverrideAction,
}

impl StyleOverride {
    pub fn hide(selector: impl Into<String>) -> Self {
        Self { selector: selector.into(), action: OverrideAction::Hide }
    }

    pub fn force_color(selector: impl Into<String>) -> Self {
        Self { selector: selector.into(), action: OverrideAction::ForceColor }
    }
}

#[derive(Debug, Clone)]
struct CompiledOverride {
    rule: StyleOverride,
    selector: Selector,
}

/// An ordered list of print rules with their selectors already compiled.
///
/// Compiling up front means a malformed selector is reported when the
/// configuration is built, and the override pass itself cannot fail.
#[derive(Debug, Clone)]
pub struct OverrideSet {
    rules: Vec<CompiledOverride>,
}

impl OverrideSet {
    pub fn new(rules: Vec<StyleOverride>) -> Result<Self> {
        let rules = rules
            .into_iter()
            .map(|rule| -> Result<CompiledOverride> {
                let selector = Selector::parse(&rule.selector).map_err(|e| Error::Selector {
                    selector: rule.selector.clone(),
                    reason: format!("{:?}", e),
                })?;
                Ok(CompiledOverride { rule, selector })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn rules(&self) -> impl Iterator<Item = &StyleOverride> {
        self.rules.iter().map(|c| &c.rule)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// The print rules for the crop results panel
pub fn default_overrides() -> Vec<StyleOverride> {
    let mut rules = vec![StyleOverride::hide(".pro-tip"), StyleOverride::hide(".export-button")];
    let text = [
        "h2", "h3", "h4", "p", "span", "li", "div",
        ".user-input-title", ".input-label", ".input-value",
        ".top-pick h3", ".top-pick .confidence", ".top-label",
        ".other-options-title", ".crop-name", ".crop-confidence",
        ".chart-title",
    ];
    rules.push(StyleOverride::force_color(text.join(", ")));
    rules.extend(
        [
            "text, .recharts-text",
            ".recharts-legend-item-text",
            ".recharts-cartesian-axis-tick text",
            ".recharts-pie-label-text",
        ]
        .into_iter()
        .map(StyleOverride::force_color),
    );
    rules
}

impl Default for OverrideSet {
    fn default() -> Self {
        OverrideSet::new(default_overrides()).expect("built-in override selectors are valid")
    }
}

/// The renderable subtree handed to an export
#[derive(Debug, Clone)]
pub struct CaptureRegion {
    document: Html,
    tree: StyledTree,
    root: NodeIndex,
    target_id: String,
}

impl CaptureRegion {
    /// Parse `html` and attach to the element whose id is `target_id`.
    pub fn from_html(html: &str, target_id: &str) -> Result<Self> {
        let document = Html::parse_document(html);
        let tree = StyledTree::from_html(&document);
        let root = tree
            .find_by_id(target_id)
            .ok_or_else(|| Error::MissingTarget(format!("no element with id `{}`", target_id)))?;
        log::debug!(
            "capture region `{}` attached at node {} ({} elements)",
            target_id,
            root,
            tree.len()
        );
        Ok(Self { document, tree, root, target_id: target_id.to_string() })
    }

    pub fn root(&self) -> NodeIndex {
        self.root
    }

    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    /// The live tree
    pub fn tree(&self) -> &StyledTree {
        &self.tree
    }

    pub(crate) fn tree_mut(&mut self) -> &mut StyledTree {
        &mut self.tree
    }

    /// Run the style override pass on a detached copy of the live tree.
    pub fn prepare_clone(&self, overrides: &OverrideSet) -> StyledTree {
        let mut clone = self.tree.clone();
        let mut hidden = 0usize;
        let mut recolored = 0usize;

        for (idx, (element, _)) in walk_elements(&self.document).into_iter().enumerate() {
            if !clone.is_descendant(idx, self.root) {
                continue;
            }
            for compiled in &overrides.rules {
                if !compiled.selector.matches(&element) {
                    continue;
                }
                let node = clone.node_mut(idx);
                match compiled.rule.action {
                    OverrideAction::Hide => {
                        node.style.set("display", "none");
                        hidden += 1;
                    }
                    OverrideAction::ForceColor => {
                        node.style.set("color", PRINT_TEXT_COLOR);
                        node.style.remove("background-color");
                        node.style.set("background", "none");
                        if node.is_vector_text() {
                            node.style.set("fill", PRINT_TEXT_COLOR);
                        }
                        recolored += 1;
                    }
                }
            }
        }

        log::debug!("style override pass: {} hidden, {} recolored", hidden, recolored);
        clone
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PANEL: &str = r##"<html><body>
        <div id="results-to-export" class="predictions-list" style="background-color: #1e293b; color: #ffffff">
          <button class="export-button">Export</button>
          <h2>Recommendations</h2>
          <div class="top-pick" style="background: rgba(255, 255, 255, 0.15)">
            <h3>rice</h3><p class="confidence">91.20%</p>
          </div>
          <svg><text class="recharts-pie-label-text" fill="#fff">rice (91%)</text></svg>
          <div class="pro-tip">Consider local market demand</div>
        </div>
        <p>outside</p>
      </body></html>"##;

    #[test]
    fn missing_target_is_reported() {
        let err = CaptureRegion::from_html(PANEL, "nope").unwrap_err();
        assert!(matches!(err, Error::MissingTarget(_)));
    }

    #[test]
    fn invalid_selector_is_a_config_error() {
        let err = OverrideSet::new(vec![StyleOverride::hide("div[")]).unwrap_err();
        assert!(matches!(err, Error::Selector { .. }));
    }

    #[test]
    fn default_rules_hide_tips_and_force_black_text() {
        let region = CaptureRegion::from_html(PANEL, DEFAULT_TARGET_ID).unwrap();
        let clone = region.prepare_clone(&OverrideSet::default());

        for class in ["pro-tip", "export-button"] {
            let idx = clone.find_by_class(class)[0];
            assert!(clone.node(idx).is_hidden(), "{} should be hidden", class);
        }

        let top = clone.find_by_class("top-pick")[0];
        assert_eq!(clone.node(top).style.get("color"), Some(PRINT_TEXT_COLOR));
        assert_eq!(clone.background(top), None);

        let label = clone.find_by_class("recharts-pie-label-text")[0];
        assert_eq!(clone.node(label).style.get("fill"), Some(PRINT_TEXT_COLOR));
        assert_eq!(clone.computed_color(label), crate::dom::Color::BLACK);
    }

    #[test]
    fn overrides_never_touch_the_live_tree() {
        let region = CaptureRegion::from_html(PANEL, DEFAULT_TARGET_ID).unwrap();
        let before = region.tree().clone();
        let clone = region.prepare_clone(&OverrideSet::default());
        assert_eq!(region.tree(), &before);
        assert_ne!(&clone, &before);
    }

    #[test]
    fn root_and_outside_elements_are_left_alone() {
        let region = CaptureRegion::from_html(PANEL, DEFAULT_TARGET_ID).unwrap();
        let rules = OverrideSet::new(vec![StyleOverride::hide("div"), StyleOverride::hide("p")]).unwrap();
        let clone = region.prepare_clone(&rules);
        assert!(!clone.node(region.root()).is_hidden());
        let outside = clone
            .find_by_class("confidence")
            .first()
            .copied()
            .map(|i| clone.node(i).is_hidden());
        assert_eq!(outside, Some(true));
        let body_p = (0..clone.len())
            .find(|&i| clone.node(i).text == "outside")
            .unwrap();
        assert!(!clone.node(body_p).is_hidden());
    }

    #[test]
    fn empty_rule_set_yields_identical_clone() {
        let region = CaptureRegion::from_html(PANEL, DEFAULT_TARGET_ID).unwrap();
        let clone = region.prepare_clone(&OverrideSet::empty());
        assert_eq!(&clone, region.tree());
    }
}
