//! Haar cascade classifier in OpenCV's XML cascade format.
//!
//! Supports boosted cascades of Haar features with ordered (non-categorical)
//! decision trees, which covers the stock `haarcascade_frontalface_*.xml`
//! files. Windows are evaluated on integral images with variance
//! normalization.

use crate::raster::IntegralImage;
use roxmltree::{Document, Node};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CascadeError {
    #[error("cascade file not found: {0}")]
    NotFound(String),
    #[error("failed to read cascade: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed cascade XML: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error("invalid cascade: {0}")]
    Invalid(String),
    #[error("unsupported cascade: {0}")]
    Unsupported(String),
}

/// One rectangle of a Haar feature, relative to the window origin.
#[derive(Debug, Clone)]
struct WeightedRect {
    x: usize,
    y: usize,
    w: usize,
    h: usize,
    weight: f64,
}

#[derive(Debug, Clone)]
struct HaarFeature {
    rects: Vec<WeightedRect>,
}

impl HaarFeature {
    fn eval(&self, ii: &IntegralImage, x: usize, y: usize) -> f64 {
        self.rects
            .iter()
            .map(|r| r.weight * ii.rect_sum(x + r.x, y + r.y, r.w, r.h) as f64)
            .sum()
    }
}

/// Split node. Children `<= 0` index leaves (`-child`), positive ones nodes.
#[derive(Debug, Clone)]
struct TreeNode {
    left: i32,
    right: i32,
    feature: usize,
    threshold: f64,
}

#[derive(Debug, Clone)]
struct WeakClassifier {
    nodes: Vec<TreeNode>,
    leaves: Vec<f64>,
}

#[derive(Debug, Clone)]
struct Stage {
    threshold: f64,
    classifiers: Vec<WeakClassifier>,
}

/// Loaded, validated cascade.
#[derive(Debug, Clone)]
pub struct Cascade {
    width: usize,
    height: usize,
    stages: Vec<Stage>,
    features: Vec<HaarFeature>,
}

impl Cascade {
    /// Load a cascade XML file.
    pub fn load(path: &Path) -> Result<Self, CascadeError> {
        if !path.exists() {
            return Err(CascadeError::NotFound(path.display().to_string()));
        }
        let xml = std::fs::read_to_string(path)?;
        let cascade = Self::from_xml(&xml)?;
        tracing::info!(
            path = %path.display(),
            window = ?cascade.window(),
            stages = cascade.stages.len(),
            features = cascade.features.len(),
            "loaded Haar cascade"
        );
        Ok(cascade)
    }

    /// Parse cascade XML text.
    pub fn from_xml(xml: &str) -> Result<Self, CascadeError> {
        let doc = Document::parse(xml)?;
        let root = doc
            .descendants()
            .find(|n| n.has_tag_name("cascade"))
            .ok_or_else(|| {
                CascadeError::Unsupported("no <cascade> element (old-style cascades are not supported)".into())
            })?;

        let stage_type = child_text(root, "stageType")?;
        if stage_type != "BOOST" {
            return Err(CascadeError::Unsupported(format!("stage type {stage_type}")));
        }
        let feature_type = child_text(root, "featureType")?;
        if feature_type != "HAAR" {
            return Err(CascadeError::Unsupported(format!("feature type {feature_type}")));
        }
        if let Some(params) = child(root, "featureParams") {
            if let Some(cats) = child(params, "maxCatCount") {
                if parse_num::<u32>(text_of(cats)?, "maxCatCount")? > 0 {
                    return Err(CascadeError::Unsupported("categorical features".into()));
                }
            }
        }

        let width: usize = parse_num(child_text(root, "width")?, "width")?;
        let height: usize = parse_num(child_text(root, "height")?, "height")?;
        if width < 3 || height < 3 {
            return Err(CascadeError::Invalid(format!("window {width}x{height} too small")));
        }

        let features = required(root, "features")?
            .children()
            .filter(Node::is_element)
            .map(|f| parse_feature(f, width, height))
            .collect::<Result<Vec<_>, _>>()?;

        let stages = required(root, "stages")?
            .children()
            .filter(Node::is_element)
            .map(|s| parse_stage(s, features.len()))
            .collect::<Result<Vec<_>, _>>()?;
        if stages.is_empty() {
            return Err(CascadeError::Invalid("cascade has no stages".into()));
        }

        Ok(Self {
            width,
            height,
            stages,
            features,
        })
    }

    /// Training window size (width, height).
    pub fn window(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Run every stage on the window at `(x, y)`. The window must lie inside `ii`.
    pub fn passes(&self, ii: &IntegralImage, x: usize, y: usize) -> bool {
        let inv_norm = ii.inv_variance_norm(x, y, self.width, self.height);

        for stage in &self.stages {
            let mut sum = 0.0;
            for weak in &stage.classifiers {
                let mut idx = 0i32;
                loop {
                    let node = &weak.nodes[idx as usize];
                    let val = self.features[node.feature].eval(ii, x, y) * inv_norm;
                    idx = if val < node.threshold { node.left } else { node.right };
                    if idx <= 0 {
                        break;
                    }
                }
                sum += weak.leaves[(-idx) as usize];
            }
            if sum < stage.threshold {
                return false;
            }
        }
        true
    }
}

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|n| n.has_tag_name(name))
}

fn required<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Result<Node<'a, 'input>, CascadeError> {
    child(node, name).ok_or_else(|| CascadeError::Invalid(format!("missing <{name}>")))
}

fn text_of<'a>(node: Node<'a, '_>) -> Result<&'a str, CascadeError> {
    node.text()
        .map(str::trim)
        .ok_or_else(|| CascadeError::Invalid(format!("<{}> is empty", node.tag_name().name())))
}

fn child_text<'a>(node: Node<'a, '_>, name: &str) -> Result<&'a str, CascadeError> {
    text_of(required(node, name)?)
}

fn parse_num<T: std::str::FromStr>(raw: &str, what: &str) -> Result<T, CascadeError> {
    raw.parse()
        .map_err(|_| CascadeError::Invalid(format!("bad {what}: {raw:?}")))
}

fn parse_list<T: std::str::FromStr>(raw: &str, what: &str) -> Result<Vec<T>, CascadeError> {
    raw.split_whitespace().map(|v| parse_num(v, what)).collect()
}

fn parse_feature(node: Node, width: usize, height: usize) -> Result<HaarFeature, CascadeError> {
    if let Some(tilted) = child(node, "tilted") {
        if parse_num::<i32>(text_of(tilted)?, "tilted")? != 0 {
            return Err(CascadeError::Unsupported("tilted Haar features".into()));
        }
    }

    let rects = required(node, "rects")?
        .children()
        .filter(Node::is_element)
        .map(|r| {
            let raw = text_of(r)?;
            let parts: Vec<&str> = raw.split_whitespace().collect();
            let [x, y, w, h, weight] = parts.as_slice() else {
                return Err(CascadeError::Invalid(format!("bad feature rect {raw:?}")));
            };
            let rect = WeightedRect {
                x: parse_num(x, "rect x")?,
                y: parse_num(y, "rect y")?,
                w: parse_num(w, "rect width")?,
                h: parse_num(h, "rect height")?,
                weight: parse_num(weight, "rect weight")?,
            };
            if rect.x + rect.w > width || rect.y + rect.h > height {
                return Err(CascadeError::Invalid(format!("feature rect {raw:?} exceeds window")));
            }
            Ok(rect)
        })
        .collect::<Result<Vec<_>, _>>()?;

    if rects.is_empty() {
        return Err(CascadeError::Invalid("feature without rects".into()));
    }
    Ok(HaarFeature { rects })
}

fn parse_stage(node: Node, feature_count: usize) -> Result<Stage, CascadeError> {
    let threshold = parse_num(child_text(node, "stageThreshold")?, "stageThreshold")?;
    let classifiers = required(node, "weakClassifiers")?
        .children()
        .filter(Node::is_element)
        .map(|w| parse_weak(w, feature_count))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Stage {
        threshold,
        classifiers,
    })
}

fn parse_weak(node: Node, feature_count: usize) -> Result<WeakClassifier, CascadeError> {
    let raw: Vec<f64> = parse_list(child_text(node, "internalNodes")?, "internalNodes")?;
    let leaves: Vec<f64> = parse_list(child_text(node, "leafValues")?, "leafValues")?;
    if raw.is_empty() || raw.len() % 4 != 0 {
        return Err(CascadeError::Invalid(format!(
            "internalNodes has {} values, expected groups of 4",
            raw.len()
        )));
    }

    let nodes: Vec<TreeNode> = raw
        .chunks_exact(4)
        .map(|c| TreeNode {
            left: c[0] as i32,
            right: c[1] as i32,
            feature: c[2] as usize,
            threshold: c[3],
        })
        .collect();

    for n in &nodes {
        if n.feature >= feature_count {
            return Err(CascadeError::Invalid(format!(
                "feature index {} out of range ({feature_count} features)",
                n.feature
            )));
        }
        for c in [n.left, n.right] {
            let ok = if c > 0 {
                (c as usize) < nodes.len()
            } else {
                ((-c) as usize) < leaves.len()
            };
            if !ok {
                return Err(CascadeError::Invalid(format!("tree child {c} out of range")));
            }
        }
    }

    Ok(WeakClassifier { nodes, leaves })
}
