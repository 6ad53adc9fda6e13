//! A minimal flex box layout engine.
//!
//! Boxes distribute their content box among their children along one axis,
//! proportionally to each child's weight, with an optional gap between
//! consecutive children. There is no wrapping and no alignment: every child is
//! stretched across the full cross axis.

use crate::error::LayoutError;
use crate::units::{Edges, Length, Size};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    #[default]
    Row,
    Column,
}

/// Integer pixel rectangle, origin top-left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Rect {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

impl Rect {
    pub fn new(x: i64, y: i64, width: i64, height: i64) -> Self {
        Self { x, y, width, height }
    }

    fn rounded(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x: x.round() as i64,
            y: y.round() as i64,
            width: width.round() as i64,
            height: height.round() as i64,
        }
    }
}

/// The two rectangles computed for every box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BoxRects {
    #[serde(rename = "box")]
    pub outer: Rect,
    #[serde(rename = "content_box")]
    pub content: Rect,
}

/// Flattened layout output keyed by box identifier, in pre-order.
pub type LayoutResult = IndexMap<String, BoxRects>;

fn default_weight() -> f64 {
    1.0
}

/// One node of a layout tree.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BoxNode {
    pub identifier: String,
    #[serde(default, rename = "flex_direction")]
    pub axis: Axis,
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default)]
    pub padding: Edges,
    #[serde(default)]
    pub gap: Length,
    #[serde(default)]
    pub children: Vec<BoxNode>,
}

impl BoxNode {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            axis: Axis::Row,
            weight: 1.0,
            padding: Edges::default(),
            gap: Length::default(),
            children: Vec::new(),
        }
    }

    pub fn row(identifier: impl Into<String>) -> Self {
        Self::new(identifier)
    }

    pub fn column(identifier: impl Into<String>) -> Self {
        Self { axis: Axis::Column, ..Self::new(identifier) }
    }

    pub fn weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn padding(mut self, padding: impl Into<Edges>) -> Self {
        self.padding = padding.into();
        self
    }

    pub fn gap(mut self, gap: Length) -> Self {
        self.gap = gap;
        self
    }

    pub fn child(mut self, child: BoxNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn children(mut self, children: impl IntoIterator<Item = BoxNode>) -> Self {
        self.children.extend(children);
        self
    }

    /// Compute rectangles for this box and all of its descendants.
    ///
    /// `root` is the reference frame for viewport units. When `None` this call
    /// is the root and its own size is used for the whole subtree.
    pub fn compute_sizes(
        &self,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        root: Option<Size>,
    ) -> Result<LayoutResult, LayoutError> {
        let root = root.unwrap_or(Size::new(width, height));
        let mut out = LayoutResult::new();
        self.compute_into(x, y, width, height, root, &mut out)?;
        Ok(out)
    }

    /// Lay out a tree rooted at the origin filling `width` x `height`.
    pub fn layout(&self, width: f64, height: f64) -> Result<LayoutResult, LayoutError> {
        self.compute_sizes(0.0, 0.0, width, height, None)
    }

    fn compute_into(
        &self,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        root: Size,
        out: &mut LayoutResult,
    ) -> Result<(), LayoutError> {
        let frame = Some(root);
        let top = self.padding.top.resolve(height, frame)? as f64;
        let right = self.padding.right.resolve(width, frame)? as f64;
        let bottom = self.padding.bottom.resolve(height, frame)? as f64;
        let left = self.padding.left.resolve(width, frame)? as f64;

        let content_x = x + left;
        let content_y = y + top;
        let content_w = width - left - right;
        let content_h = height - top - bottom;

        let rects = BoxRects {
            outer: Rect::rounded(x, y, width, height),
            content: Rect::rounded(content_x, content_y, content_w, content_h),
        };
        if out.insert(self.identifier.clone(), rects).is_some() {
            return Err(LayoutError::DuplicateIdentifier(self.identifier.clone()));
        }

        if self.children.is_empty() {
            return Ok(());
        }

        let weight_sum: f64 = self.children.iter().map(|c| c.weight).sum();
        if !(weight_sum > 0.0) {
            return Err(LayoutError::ZeroWeightSum(self.identifier.clone()));
        }
        if let Some(child) = self.children.iter().find(|c| !(c.weight.is_finite() && c.weight > 0.0)) {
            return Err(LayoutError::InvalidWeight { identifier: child.identifier.clone(), weight: child.weight });
        }

        let gaps = (self.children.len() - 1) as f64;
        let (mut cx, mut cy) = (content_x, content_y);
        match self.axis {
            Axis::Row => {
                let gap = self.gap.resolve(width, frame)? as f64;
                let main = content_w - gaps * gap;
                for child in &self.children {
                    let w = main * child.weight / weight_sum;
                    child.compute_into(cx, cy, w, content_h, root, out)?;
                    cx += w + gap;
                }
            }
            Axis::Column => {
                let gap = self.gap.resolve(height, frame)? as f64;
                let main = content_h - gaps * gap;
                for child in &self.children {
                    let h = main * child.weight / weight_sum;
                    child.compute_into(cx, cy, content_w, h, root, out)?;
                    cy += h + gap;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weather_like() -> BoxNode {
        BoxNode::column("root")
            .padding(Length::Vw(2.0))
            .gap(Length::Px(10.0))
            .children([
                BoxNode::row("a").weight(2.0),
                BoxNode::row("b").weight(1.0),
            ])
    }

    #[test]
    fn test_column_of_two_rows() {
        let out = weather_like().layout(1024.0, 768.0).unwrap();

        let root = out["root"];
        assert_eq!(root.outer, Rect::new(0, 0, 1024, 768));
        assert_eq!(root.content, Rect::new(20, 20, 984, 728));

        // (768 - 40 - 10) * 2/3 = 478.67, * 1/3 = 239.33
        let a = out["a"];
        assert_eq!(a.content, Rect::new(20, 20, 984, 479));
        let b = out["b"];
        assert_eq!(b.content, Rect::new(20, 509, 984, 239));
    }

    #[test]
    fn test_main_axis_sum_within_rounding() {
        let tree = BoxNode::row("r")
            .padding(Length::Px(3.0))
            .gap(Length::Percent(1.0))
            .children((0..7).map(|i| BoxNode::new(format!("c{i}")).weight(1.0 + i as f64 * 0.5)));

        for (w, h) in [(100.0, 50.0), (333.0, 71.0), (1920.0, 1080.0), (17.0, 9.0)] {
            let out = tree.layout(w, h).unwrap();
            let parent = out["r"].content;
            let gap = Length::Percent(1.0).resolve(w, None).unwrap();
            let n = tree.children.len() as i64;

            let sum: i64 = (0..n).map(|i| out[&format!("c{i}")].outer.width).sum();
            let total = sum + (n - 1) * gap;
            assert!((total - parent.width).abs() <= n - 1, "{w}x{h}: {total} vs {}", parent.width);

            for i in 0..n {
                let child = out[&format!("c{i}")].outer;
                assert_eq!(child.height, parent.height);
                assert_eq!(child.y, parent.y);
            }
        }
    }

    #[test]
    fn test_cross_axis_is_full_stretch() {
        let tree = BoxNode::column("col")
            .padding(Edges::new(1.into(), 7.into(), 3.into(), 5.into()))
            .children([BoxNode::new("x"), BoxNode::new("y").weight(3.0)]);
        let out = tree.layout(201.0, 99.0).unwrap();
        let content = out["col"].content;
        assert_eq!(content, Rect::new(5, 1, 189, 95));
        for id in ["x", "y"] {
            assert_eq!(out[id].outer.x, content.x);
            assert_eq!(out[id].outer.width, content.width);
        }
    }

    #[test]
    fn test_viewport_units_use_root_size() {
        let tree = BoxNode::row("root").child(
            BoxNode::new("half").child(BoxNode::new("inner").padding(Length::Vw(10.0))),
        );
        let out = tree.compute_sizes(0.0, 0.0, 500.0, 200.0, None).unwrap();
        // 10vw of the 500px root, not of the nested box
        assert_eq!(out["inner"].content, Rect::new(50, 50, 400, 100));

        let explicit = tree.compute_sizes(0.0, 0.0, 500.0, 200.0, Some(Size::new(1000.0, 100.0))).unwrap();
        assert_eq!(explicit["inner"].content, Rect::new(100, 100, 300, 0));
    }

    #[test]
    fn test_origin_offsets_everything() {
        let out = weather_like().compute_sizes(100.0, 50.0, 1024.0, 768.0, None).unwrap();
        assert_eq!(out["root"].outer, Rect::new(100, 50, 1024, 768));
        assert_eq!(out["a"].outer.x, 120);
        assert_eq!(out["a"].outer.y, 70);
    }

    #[test]
    fn test_leaf_with_gap_has_no_children_to_split() {
        let out = BoxNode::column("leaf").gap(Length::Px(50.0)).layout(10.0, 10.0).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out["leaf"].content, Rect::new(0, 0, 10, 10));
    }

    #[test]
    fn test_zero_weight_sum_is_an_error() {
        let tree = BoxNode::row("r").children([BoxNode::new("a").weight(0.0), BoxNode::new("b").weight(0.0)]);
        let err = tree.layout(100.0, 100.0).unwrap_err();
        assert!(matches!(err, LayoutError::ZeroWeightSum(id) if id == "r"));
    }

    #[test]
    fn test_non_positive_weights_are_rejected() {
        let tree = BoxNode::row("r").children([BoxNode::new("a").weight(2.0), BoxNode::new("b").weight(-1.0)]);
        let err = tree.layout(100.0, 100.0).unwrap_err();
        assert!(matches!(err, LayoutError::InvalidWeight { identifier, weight } if identifier == "b" && weight == -1.0));

        let tree = BoxNode::column("c").children([BoxNode::new("a"), BoxNode::new("z").weight(0.0)]);
        assert!(matches!(tree.layout(100.0, 100.0), Err(LayoutError::InvalidWeight { identifier, .. }) if identifier == "z"));

        let tree = BoxNode::column("c").children([BoxNode::new("a"), BoxNode::new("inf").weight(f64::INFINITY)]);
        assert!(matches!(tree.layout(100.0, 100.0), Err(LayoutError::InvalidWeight { identifier, .. }) if identifier == "inf"));
    }

    #[test]
    fn test_duplicate_identifiers_fail_fast() {
        let tree = BoxNode::row("r").children([BoxNode::new("a"), BoxNode::new("a")]);
        let err = tree.layout(100.0, 100.0).unwrap_err();
        assert!(matches!(err, LayoutError::DuplicateIdentifier(id) if id == "a"));
    }

    #[test]
    fn test_compute_is_idempotent() {
        let tree = weather_like();
        let first = tree.layout(777.0, 555.0).unwrap();
        let second = tree.layout(777.0, 555.0).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_deserialize_tree() {
        let json = r#"{
            "identifier": "root",
            "flex_direction": "column",
            "padding": ["2vw", "5vw"],
            "gap": "5%",
            "children": [
                {"identifier": "top", "weight": 2},
                {"identifier": "bottom"}
            ]
        }"#;
        let tree: BoxNode = serde_json::from_str(json).unwrap();
        assert_eq!(tree.axis, Axis::Column);
        assert_eq!(tree.children.len(), 2);
        assert_eq!(tree.children[0].weight, 2.0);
        assert_eq!(tree.children[1].weight, 1.0);
        assert_eq!(tree.children[1].axis, Axis::Row);
        assert!(tree.children[1].children.is_empty());
        assert_eq!(tree.gap, Length::Percent(5.0));
    }
}
